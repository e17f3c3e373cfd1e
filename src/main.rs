//! S3 Glacier Restore Tool
//!
//! Restores SQL database backup objects from the S3 Glacier storage class
//! back into Standard storage, driven by a CSV manifest, and emails the
//! requesting users as each restore completes or fails.

// glacierrestore/src/main.rs
mod config;
mod errors;
mod manifest;
mod notify;
mod restore;

use anyhow::{Context, Result};
use config::AppConfig;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

/// Main entry point for the Glacier restore tool
#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    // Expects config.json next to the executable, or in the project root when
    // running with `cargo run`.
    let config_path = PathBuf::from("config.json");
    let mut app_config = AppConfig::load_from_json(&config_path).context(format!(
        "Failed to load application configuration from {}",
        config_path.display()
    ))?;

    // An optional CLI argument overrides the manifest path from config.json.
    let args: Vec<String> = env::args().collect();
    if args.len() > 1 {
        app_config.manifest_path = PathBuf::from(args[1].trim());
    }

    println!(
        "🚀 Starting S3 Glacier restore run from manifest {}...",
        app_config.manifest_path.display()
    );
    restore::run_restore_flow(&app_config)
        .await
        .context("Glacier restore run failed")?;
    Ok(())
}
