// glacierrestore/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MANIFEST_PATH: &str = "restore_list.csv";
const DEFAULT_SMTP_RELAY: &str = "process-automation.loc";
const DEFAULT_SMTP_PORT: u16 = 25;
const DEFAULT_FROM_ADDRESS: &str = "s3-glacier-restore@glacierrestore.com";
const DEFAULT_RESTORE_DAYS: i32 = 1;
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 360;

// Structs for deserializing config.json
#[derive(Debug, Clone, Deserialize)]
pub struct JsonS3StorageConfig {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonSmtpConfig {
    pub relay_host: Option<String>,
    pub port: Option<u16>,
    pub from_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRestoreOptions {
    pub restore_days: Option<i32>,
    pub poll_interval_secs: Option<u64>,
    pub max_poll_attempts: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawJsonConfig {
    pub manifest_path: Option<PathBuf>,
    pub s3_storage: Option<JsonS3StorageConfig>,
    pub smtp: Option<JsonSmtpConfig>,
    pub restore_options: Option<JsonRestoreOptions>,
}

// Application's internal configuration structs
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub relay_host: String,
    pub port: u16,
    pub from_address: String,
}

#[derive(Debug, Clone)]
pub struct RestoreOptions {
    pub restore_days: i32,
    pub poll_interval: Duration,
    pub max_poll_attempts: u32,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub manifest_path: PathBuf,
    pub storage: StorageConfig,
    pub mail: MailConfig,
    pub restore: RestoreOptions,
}

impl AppConfig {
    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig = serde_json::from_str(&config_content)
            .with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;
        Ok(Self::from_raw(raw_json_config))
    }

    pub fn from_raw(raw: RawJsonConfig) -> Self {
        let storage = raw
            .s3_storage
            .as_ref()
            .map(|s3_raw| StorageConfig {
                region: s3_raw.region.clone().filter(|s| !s.is_empty()),
                endpoint_url: s3_raw.endpoint_url.clone().filter(|s| !s.is_empty()),
                access_key_id: s3_raw.access_key_id.clone().filter(|s| !s.is_empty()),
                secret_access_key: s3_raw.secret_access_key.clone().filter(|s| !s.is_empty()),
            })
            .unwrap_or_default();

        // Static credentials must come as a pair; a lone key id or secret falls
        // back to the default AWS provider chain.
        let storage = if storage.access_key_id.is_some() != storage.secret_access_key.is_some() {
            println!(
                "⚠️ Only one of access_key_id/secret_access_key is set in config.json. \
                Ignoring both and using the default AWS credentials chain."
            );
            StorageConfig {
                access_key_id: None,
                secret_access_key: None,
                ..storage
            }
        } else {
            storage
        };

        let smtp_raw = raw.smtp.as_ref();
        let mail = MailConfig {
            relay_host: smtp_raw
                .and_then(|s| s.relay_host.clone())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SMTP_RELAY.to_string()),
            port: smtp_raw.and_then(|s| s.port).unwrap_or(DEFAULT_SMTP_PORT),
            from_address: smtp_raw
                .and_then(|s| s.from_address.clone())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_FROM_ADDRESS.to_string()),
        };

        let opts_raw = raw.restore_options.as_ref();
        let restore = RestoreOptions {
            restore_days: opts_raw
                .and_then(|o| o.restore_days)
                .unwrap_or(DEFAULT_RESTORE_DAYS),
            poll_interval: Duration::from_secs(
                opts_raw
                    .and_then(|o| o.poll_interval_secs)
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            max_poll_attempts: opts_raw
                .and_then(|o| o.max_poll_attempts)
                .unwrap_or(DEFAULT_MAX_POLL_ATTEMPTS),
        };

        AppConfig {
            manifest_path: raw
                .manifest_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST_PATH)),
            storage,
            mail,
            restore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_for_empty_config() {
        let config = AppConfig::from_raw(RawJsonConfig::default());

        assert_eq!(config.manifest_path, PathBuf::from(DEFAULT_MANIFEST_PATH));
        assert_eq!(config.mail.relay_host, DEFAULT_SMTP_RELAY);
        assert_eq!(config.mail.port, DEFAULT_SMTP_PORT);
        assert_eq!(config.mail.from_address, DEFAULT_FROM_ADDRESS);
        assert_eq!(config.restore.restore_days, 1);
        assert_eq!(config.restore.poll_interval, Duration::from_secs(60));
        assert_eq!(config.restore.max_poll_attempts, 360);
        assert!(config.storage.region.is_none());
        assert!(config.storage.access_key_id.is_none());
    }

    #[test]
    fn test_full_config_parse() -> anyhow::Result<()> {
        let raw: RawJsonConfig = serde_json::from_str(
            r#"{
                "manifest_path": "lists/restores.csv",
                "s3_storage": {
                    "region": "us-east-2",
                    "endpoint_url": "http://localhost:9000",
                    "access_key_id": "AKIAEXAMPLE",
                    "secret_access_key": "secret"
                },
                "smtp": {
                    "relay_host": "mail.internal.example",
                    "port": 2525,
                    "from_address": "restores@example.com"
                },
                "restore_options": {
                    "restore_days": 3,
                    "poll_interval_secs": 30,
                    "max_poll_attempts": 10
                }
            }"#,
        )?;
        let config = AppConfig::from_raw(raw);

        assert_eq!(config.manifest_path, PathBuf::from("lists/restores.csv"));
        assert_eq!(config.storage.region.as_deref(), Some("us-east-2"));
        assert_eq!(
            config.storage.endpoint_url.as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(config.mail.relay_host, "mail.internal.example");
        assert_eq!(config.mail.port, 2525);
        assert_eq!(config.restore.restore_days, 3);
        assert_eq!(config.restore.poll_interval, Duration::from_secs(30));
        assert_eq!(config.restore.max_poll_attempts, 10);
        Ok(())
    }

    #[test]
    fn test_lone_access_key_is_dropped() -> anyhow::Result<()> {
        let raw: RawJsonConfig = serde_json::from_str(
            r#"{ "s3_storage": { "access_key_id": "AKIAEXAMPLE" } }"#,
        )?;
        let config = AppConfig::from_raw(raw);

        assert!(config.storage.access_key_id.is_none());
        assert!(config.storage.secret_access_key.is_none());
        Ok(())
    }
}
