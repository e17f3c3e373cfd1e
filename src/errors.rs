use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Manifest validation error: {0}")]
    Validation(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Date resolution error: {0}")]
    Resolution(String),

    #[error("Restore polling timed out: {0}")]
    Timeout(String),

    #[error("Post-copy verification failed: {0}")]
    Verification(String),

    #[error("Storage service error: {0}")]
    TransientService(String),

    #[error("AWS SDK S3 error: {0}")]
    S3Sdk(String),

    #[error("Mail delivery error: {0}")]
    Mail(String),

    #[error("Manifest parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
