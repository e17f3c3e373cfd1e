mod logic;
pub(crate) mod poller;
pub(crate) mod promote;
pub(crate) mod resolver;
pub(crate) mod store;

use anyhow::{Context, Result};

use crate::config::AppConfig;
use crate::manifest;
use crate::notify::Mailer;
use store::AwsObjectStore;

/// Public entry point for a restore run: loads the manifest, builds the AWS
/// client and the SMTP notifier, and hands everything to the batch loop.
pub async fn run_restore_flow(app_config: &AppConfig) -> Result<()> {
    let loaded = manifest::load_manifest(&app_config.manifest_path).with_context(|| {
        format!(
            "Failed to load restore manifest from {}",
            app_config.manifest_path.display()
        )
    })?;

    let store = AwsObjectStore::from_config(&app_config.storage).await;
    let mailer = Mailer::from_config(&app_config.mail)
        .context("Failed to configure the SMTP notifier")?;

    let summary = logic::run_batch(&store, &mailer, loaded, &app_config.restore)
        .await
        .context("Restore batch failed")?;

    if summary.failed > 0 {
        anyhow::bail!(
            "{} restore(s) failed; see the alert emails and log output above",
            summary.failed
        );
    }
    Ok(())
}
