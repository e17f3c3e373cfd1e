// glacierrestore/src/restore/store.rs
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::error::{DisplayErrorContext, ProvideErrorMetadata};
use s3::types::{
    CompletedMultipartUpload, CompletedPart, GlacierJobParameters, MetadataDirective,
    StorageClass, Tier,
};

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use crate::manifest::RetrievalTier;

/// Metadata key stamped onto the object when it is copied back into Standard
/// storage.
pub const RESTORED_AT_METADATA_KEY: &str = "restored-at";

/// Size of each part used for the multipart in-place copy. UploadPartCopy
/// accepts parts up to 5 GB; 1 GiB keeps part counts small without getting
/// near the cap.
const COPY_PART_SIZE: i64 = 1024 * 1024 * 1024;

/// State of an object's temporary Glacier restore, read from the
/// `x-amz-restore` header on a HEAD probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStatus {
    /// No restore header at all: the object is not in an archived tier (or the
    /// restore request has not been reflected yet).
    NotArchived,
    /// `ongoing-request="true"`: the restore is still running.
    InProgress,
    /// `ongoing-request="false"`: a temporary copy is available.
    Restored,
}

#[derive(Debug, Clone)]
pub struct ObjectProbe {
    pub size: i64,
    pub restore: RestoreStatus,
}

/// How the storage service answered a restore request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The object is already outside the archived tier; skip straight to the
    /// copy step.
    AlreadyRestored,
    /// Restoration has been accepted (or was already running); poll until the
    /// temporary copy appears.
    Accepted,
}

/// Object-storage operations the restore flow needs. The AWS client
/// implements this for real runs; tests drive the flow through a mock.
pub trait ObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>>;

    async fn probe(&self, bucket: &str, key: &str) -> Result<ObjectProbe>;

    async fn initiate_restore(
        &self,
        bucket: &str,
        key: &str,
        tier: RetrievalTier,
        days: i32,
    ) -> Result<RestoreOutcome>;

    /// Single-call in-place copy with metadata replacement, landing the object
    /// in Standard storage at its existing key.
    async fn copy_in_place(&self, bucket: &str, key: &str, restored_at: &str) -> Result<()>;

    /// Multipart in-place copy for objects too large for a single CopyObject
    /// call.
    async fn copy_in_place_multipart(
        &self,
        bucket: &str,
        key: &str,
        size: i64,
        restored_at: &str,
    ) -> Result<()>;
}

pub(crate) fn parse_restore_header(header: Option<&str>) -> RestoreStatus {
    match header {
        None => RestoreStatus::NotArchived,
        Some(value) if value.contains(r#"ongoing-request="true""#) => RestoreStatus::InProgress,
        Some(_) => RestoreStatus::Restored,
    }
}

fn sdk_tier(tier: RetrievalTier) -> Tier {
    match tier {
        RetrievalTier::Standard => Tier::Standard,
        RetrievalTier::Expedited => Tier::Expedited,
        RetrievalTier::Bulk => Tier::Bulk,
    }
}

/// `ObjectStore` backed by the AWS S3 SDK.
pub struct AwsObjectStore {
    client: s3::Client,
}

impl AwsObjectStore {
    /// Builds a client from the optional overrides in config.json, falling
    /// back to the default AWS provider chain for anything unset.
    pub async fn from_config(storage: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if let Some(endpoint) = &storage.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = &storage.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key_id), Some(secret)) =
            (&storage.access_key_id, &storage.secret_access_key)
        {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                key_id, secret, None, // session_token
                None, // expiry
                "Static",
            ));
        }
        let sdk_config = loader.load().await;
        AwsObjectStore {
            client: s3::Client::new(&sdk_config),
        }
    }

    async fn copy_parts(
        &self,
        bucket: &str,
        key: &str,
        size: i64,
        upload_id: &str,
    ) -> Result<Vec<CompletedPart>> {
        let copy_source = format!("{}/{}", bucket, key);
        let mut parts = Vec::new();
        let mut part_number = 1;
        let mut offset: i64 = 0;
        while offset < size {
            let end = (offset + COPY_PART_SIZE).min(size) - 1;
            let out = self
                .client
                .upload_part_copy()
                .bucket(bucket)
                .key(key)
                .copy_source(&copy_source)
                .copy_source_range(format!("bytes={}-{}", offset, end))
                .upload_id(upload_id)
                .part_number(part_number)
                .send()
                .await
                .map_err(|e| {
                    AppError::S3Sdk(format!(
                        "UploadPartCopy {} failed for s3://{}/{}: {}",
                        part_number,
                        bucket,
                        key,
                        DisplayErrorContext(&e)
                    ))
                })?;
            let e_tag = out
                .copy_part_result()
                .and_then(|r| r.e_tag())
                .ok_or_else(|| {
                    AppError::S3Sdk(format!(
                        "UploadPartCopy {} for s3://{}/{} returned no ETag",
                        part_number, bucket, key
                    ))
                })?;
            parts.push(
                CompletedPart::builder()
                    .part_number(part_number)
                    .e_tag(e_tag)
                    .build(),
            );
            offset = end + 1;
            part_number += 1;
        }
        Ok(parts)
    }
}

impl ObjectStore for AwsObjectStore {
    async fn list_keys(&self, bucket: &str, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let response = request.send().await.map_err(|e| {
                AppError::TransientService(format!(
                    "ListObjectsV2 failed for s3://{}/{}: {}",
                    bucket,
                    prefix,
                    DisplayErrorContext(&e)
                ))
            })?;
            for object in response.contents() {
                if let Some(key) = object.key() {
                    keys.push(key.to_string());
                }
            }
            if response.is_truncated() == Some(true) {
                continuation = response.next_continuation_token().map(str::to_string);
                if continuation.is_none() {
                    break;
                }
            } else {
                break;
            }
        }
        Ok(keys)
    }

    async fn probe(&self, bucket: &str, key: &str) -> Result<ObjectProbe> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => Ok(ObjectProbe {
                size: head.content_length().unwrap_or(0),
                restore: parse_restore_header(head.restore()),
            }),
            Err(e) => {
                if e.as_service_error().map(|err| err.is_not_found()) == Some(true) {
                    Err(AppError::NotFound(format!("s3://{}/{}", bucket, key)))
                } else {
                    Err(AppError::TransientService(format!(
                        "HeadObject failed for s3://{}/{}: {}",
                        bucket,
                        key,
                        DisplayErrorContext(&e)
                    )))
                }
            }
        }
    }

    async fn initiate_restore(
        &self,
        bucket: &str,
        key: &str,
        tier: RetrievalTier,
        days: i32,
    ) -> Result<RestoreOutcome> {
        let job_parameters = GlacierJobParameters::builder()
            .tier(sdk_tier(tier))
            .build()
            .map_err(|e| AppError::S3Sdk(format!("Invalid Glacier job parameters: {}", e)))?;
        let restore_request = s3::types::RestoreRequest::builder()
            .days(days)
            .glacier_job_parameters(job_parameters)
            .build();

        match self
            .client
            .restore_object()
            .bucket(bucket)
            .key(key)
            .restore_request(restore_request)
            .send()
            .await
        {
            Ok(_) => Ok(RestoreOutcome::Accepted),
            Err(e) => match e.as_service_error() {
                // The object is already outside Glacier; nothing to wait for.
                Some(err) if err.is_object_already_in_active_tier_error() => {
                    Ok(RestoreOutcome::AlreadyRestored)
                }
                // A previous run already kicked the restore off.
                Some(err) if err.code() == Some("RestoreAlreadyInProgress") => {
                    Ok(RestoreOutcome::Accepted)
                }
                _ => Err(AppError::TransientService(format!(
                    "RestoreObject failed for s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))),
            },
        }
    }

    async fn copy_in_place(&self, bucket: &str, key: &str, restored_at: &str) -> Result<()> {
        self.client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(format!("{}/{}", bucket, key))
            .metadata_directive(MetadataDirective::Replace)
            .metadata(RESTORED_AT_METADATA_KEY, restored_at)
            .storage_class(StorageClass::Standard)
            .send()
            .await
            .map_err(|e| {
                AppError::S3Sdk(format!(
                    "CopyObject failed for s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn copy_in_place_multipart(
        &self,
        bucket: &str,
        key: &str,
        size: i64,
        restored_at: &str,
    ) -> Result<()> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .metadata(RESTORED_AT_METADATA_KEY, restored_at)
            .storage_class(StorageClass::Standard)
            .send()
            .await
            .map_err(|e| {
                AppError::S3Sdk(format!(
                    "CreateMultipartUpload failed for s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        let upload_id = create.upload_id().ok_or_else(|| {
            AppError::S3Sdk(format!(
                "CreateMultipartUpload for s3://{}/{} returned no upload id",
                bucket, key
            ))
        })?;

        let parts = match self.copy_parts(bucket, key, size, upload_id).await {
            Ok(parts) => parts,
            Err(e) => {
                // Best effort: do not leave an orphaned multipart upload behind.
                let _ = self
                    .client
                    .abort_multipart_upload()
                    .bucket(bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .send()
                    .await;
                return Err(e);
            }
        };

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                AppError::S3Sdk(format!(
                    "CompleteMultipartUpload failed for s3://{}/{}: {}",
                    bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_parse_restore_header() {
        assert_eq!(parse_restore_header(None), RestoreStatus::NotArchived);
        assert_eq!(
            parse_restore_header(Some(r#"ongoing-request="true""#)),
            RestoreStatus::InProgress
        );
        assert_eq!(
            parse_restore_header(Some(
                r#"ongoing-request="false", expiry-date="Fri, 21 Dec 2021 00:00:00 GMT""#
            )),
            RestoreStatus::Restored
        );
    }

    /// In-memory `ObjectStore` for exercising the restore flow. `statuses` is
    /// consumed one entry per probe; the last entry repeats once drained.
    pub(crate) struct MockStore {
        pub keys: Vec<String>,
        pub size: i64,
        pub fail_listing: bool,
        pub restore_outcome: RestoreOutcome,
        pub statuses: Mutex<Vec<RestoreStatus>>,
        pub probes: Mutex<Vec<String>>,
        pub restores: Mutex<Vec<(String, RetrievalTier, i32)>>,
        pub simple_copies: Mutex<Vec<String>>,
        pub multipart_copies: Mutex<Vec<(String, i64)>>,
    }

    impl MockStore {
        pub(crate) fn new(keys: Vec<String>, size: i64) -> Self {
            MockStore {
                keys,
                size,
                fail_listing: false,
                restore_outcome: RestoreOutcome::Accepted,
                statuses: Mutex::new(vec![RestoreStatus::Restored]),
                probes: Mutex::new(Vec::new()),
                restores: Mutex::new(Vec::new()),
                simple_copies: Mutex::new(Vec::new()),
                multipart_copies: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn with_statuses(mut self, statuses: Vec<RestoreStatus>) -> Self {
            self.statuses = Mutex::new(statuses);
            self
        }

        pub(crate) fn with_outcome(mut self, outcome: RestoreOutcome) -> Self {
            self.restore_outcome = outcome;
            self
        }

        pub(crate) fn copy_count(&self) -> usize {
            self.simple_copies.lock().unwrap().len()
                + self.multipart_copies.lock().unwrap().len()
        }

        pub(crate) fn probe_count(&self) -> usize {
            self.probes.lock().unwrap().len()
        }

        fn next_status(&self) -> RestoreStatus {
            let mut statuses = self.statuses.lock().unwrap();
            if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                statuses[0]
            }
        }
    }

    impl ObjectStore for MockStore {
        async fn list_keys(&self, _bucket: &str, prefix: &str) -> Result<Vec<String>> {
            if self.fail_listing {
                return Err(AppError::TransientService(
                    "ListObjectsV2 unavailable".to_string(),
                ));
            }
            Ok(self
                .keys
                .iter()
                .filter(|k| k.starts_with(prefix))
                .cloned()
                .collect())
        }

        async fn probe(&self, bucket: &str, key: &str) -> Result<ObjectProbe> {
            if !self.keys.iter().any(|k| k == key) {
                return Err(AppError::NotFound(format!("s3://{}/{}", bucket, key)));
            }
            self.probes.lock().unwrap().push(key.to_string());
            Ok(ObjectProbe {
                size: self.size,
                restore: self.next_status(),
            })
        }

        async fn initiate_restore(
            &self,
            _bucket: &str,
            key: &str,
            tier: RetrievalTier,
            days: i32,
        ) -> Result<RestoreOutcome> {
            self.restores
                .lock()
                .unwrap()
                .push((key.to_string(), tier, days));
            Ok(self.restore_outcome)
        }

        async fn copy_in_place(&self, _bucket: &str, key: &str, _restored_at: &str) -> Result<()> {
            self.simple_copies.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn copy_in_place_multipart(
            &self,
            _bucket: &str,
            key: &str,
            size: i64,
            _restored_at: &str,
        ) -> Result<()> {
            self.multipart_copies
                .lock()
                .unwrap()
                .push((key.to_string(), size));
            Ok(())
        }
    }
}
