// glacierrestore/src/restore/promote.rs
use chrono::Local;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::restore::store::ObjectStore;

/// Objects at or above this size take the multipart copy path. S3 caps
/// single-call CopyObject at 5 GB, so the cutover sits just under it.
pub const MULTIPART_COPY_THRESHOLD: i64 = 4_990_000_000;

/// Copies the restored object over itself so it lands back in Standard
/// storage at the same key. Verifies afterwards that the copy kept the
/// object's size.
pub async fn promote_object<S: ObjectStore>(
    store: &S,
    job_id: Uuid,
    bucket: &str,
    key: &str,
) -> Result<()> {
    let before = store.probe(bucket, key).await?;
    let restored_at = Local::now().to_rfc3339();

    if before.size >= MULTIPART_COPY_THRESHOLD {
        println!(
            "📦 [{}] Copying s3://{}/{} in place via multipart ({} bytes).",
            job_id, bucket, key, before.size
        );
        store
            .copy_in_place_multipart(bucket, key, before.size, &restored_at)
            .await?;
    } else {
        println!(
            "📦 [{}] Copying s3://{}/{} in place ({} bytes).",
            job_id, bucket, key, before.size
        );
        store.copy_in_place(bucket, key, &restored_at).await?;
    }

    let after = store.probe(bucket, key).await?;
    if after.size != before.size {
        return Err(AppError::Verification(format!(
            "Size changed across in-place copy of s3://{}/{}: {} bytes before, {} after",
            bucket, key, before.size, after.size
        )));
    }

    println!(
        "✅ [{}] s3://{}/{} is back in Standard storage.",
        job_id, bucket, key
    );
    Ok(())
}
