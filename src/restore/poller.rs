// glacierrestore/src/restore/poller.rs
use std::time::Duration;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::restore::store::{ObjectStore, RestoreStatus};

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

/// Terminal poll results. `NeverArchived` means the restore header never
/// appeared: the object was not in the cold tier, so there is nothing to
/// promote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollVerdict {
    NeverArchived,
    Restored,
}

/// Re-probes the object until its temporary-restore indicator reports a
/// finished restore. Bounded: exceeding `max_attempts` surfaces a Timeout
/// instead of polling forever.
pub async fn poll_until_restored<S: ObjectStore>(
    store: &S,
    job_id: Uuid,
    bucket: &str,
    key: &str,
    settings: &PollSettings,
) -> Result<PollVerdict> {
    for attempt in 1..=settings.max_attempts {
        let probe = store.probe(bucket, key).await?;
        match probe.restore {
            RestoreStatus::NotArchived => {
                println!(
                    "⚠️ [{}] s3://{}/{} has no restore marker; it was never in the Glacier tier.",
                    job_id, bucket, key
                );
                return Ok(PollVerdict::NeverArchived);
            }
            RestoreStatus::Restored => {
                println!(
                    "✓ [{}] Restore of s3://{}/{} finished after {} poll(s).",
                    job_id, bucket, key, attempt
                );
                return Ok(PollVerdict::Restored);
            }
            RestoreStatus::InProgress => {
                println!(
                    "⏳ [{}] Restore of s3://{}/{} still in progress (poll {}/{}).",
                    job_id, bucket, key, attempt, settings.max_attempts
                );
                tokio::time::sleep(settings.interval).await;
            }
        }
    }

    Err(AppError::Timeout(format!(
        "Restore of s3://{}/{} still in progress after {} polls at {:?} intervals",
        bucket, key, settings.max_attempts, settings.interval
    )))
}
