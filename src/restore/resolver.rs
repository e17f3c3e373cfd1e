// glacierrestore/src/restore/resolver.rs
use chrono::NaiveDate;

use crate::errors::{AppError, Result};
use crate::manifest::RestoreRequest;
use crate::restore::store::ObjectStore;

/// Normalizes a manifest `last_modified` value (MMDDYYYY, day may be a single
/// digit) into the day-month-year digit string that backup object keys carry.
///
/// `"7212021"` zero-pads to `"07212021"` and reformats to `"21072021"`.
pub fn date_match_substring(last_modified: &str) -> Result<String> {
    let padded = if last_modified.len() == 7 {
        format!("0{}", last_modified)
    } else {
        last_modified.to_string()
    };

    // Eight digits forming a real calendar date; %Y alone would accept longer years.
    if padded.len() != 8 || NaiveDate::parse_from_str(&padded, "%m%d%Y").is_err() {
        return Err(AppError::Resolution(format!(
            "last_modified '{}' is not a valid MMDDYYYY date",
            last_modified
        )));
    }

    Ok(format!("{}{}{}", &padded[2..4], &padded[0..2], &padded[4..8]))
}

fn leaf_name(key: &str) -> &str {
    match key.rfind('/') {
        Some(idx) => &key[idx + 1..],
        None => key,
    }
}

/// Resolves the manifest row to a concrete object key.
///
/// With a `file_name` the object's existence is confirmed by a HEAD probe.
/// Without one, objects under the request's prefix are scanned for a key
/// containing the reformatted `last_modified` date; the first match wins and
/// its leaf name is written back into the request.
pub async fn resolve_object<S: ObjectStore>(
    store: &S,
    request: &mut RestoreRequest,
) -> Result<String> {
    let prefix = request.partial_prefix();

    if let Some(file_name) = &request.file_name {
        let key = format!("{}/{}", prefix, file_name);
        store.probe(&request.s3_bucket_name, &key).await?;
        println!(
            "✓ File '{}' exists in bucket '{}'.",
            file_name, request.s3_bucket_name
        );
        return Ok(key);
    }

    let last_modified = request
        .last_modified
        .as_deref()
        .ok_or_else(|| {
            AppError::Validation(format!(
                "Neither file_name nor last_modified was provided for database '{}'",
                request.sql_database_name
            ))
        })?;
    let date_substring = date_match_substring(last_modified)?;
    println!(
        "🔍 No file name provided; searching under '{}' for an object matching date {}.",
        prefix, last_modified
    );

    let keys = store.list_keys(&request.s3_bucket_name, &prefix).await?;
    for key in keys {
        if key.contains(&date_substring) {
            let file_name = leaf_name(&key).to_string();
            println!(
                "✓ File '{}' matched last modified date {} under '{}'.",
                file_name, last_modified, prefix
            );
            request.file_name = Some(file_name);
            return Ok(key);
        }
    }

    Err(AppError::Resolution(format!(
        "No object under '{}' in bucket '{}' matches the last modified date {}",
        prefix, request.s3_bucket_name, last_modified
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::tests::sample_request;
    use crate::restore::store::tests::MockStore;

    #[test]
    fn test_seven_digit_date_is_zero_padded() -> anyhow::Result<()> {
        assert_eq!(date_match_substring("7212021")?, "21072021");
        Ok(())
    }

    #[test]
    fn test_eight_digit_date_is_reformatted() -> anyhow::Result<()> {
        assert_eq!(date_match_substring("12012020")?, "01122020");
        Ok(())
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        for bad in ["13452021", "garbage!", "123", "00000000", "121220201"] {
            let err = date_match_substring(bad).unwrap_err();
            assert!(matches!(err, AppError::Resolution(_)), "input: {}", bad);
        }
    }

    #[tokio::test]
    async fn test_resolution_by_date_writes_back_leaf_name() -> anyhow::Result<()> {
        let mut request = sample_request();
        request.file_name = None;
        request.last_modified = Some("7212021".to_string());

        let store = MockStore::new(
            vec![
                "backups/sqlprod01/MSSQLSERVER/orders/orders_full_20072021.bak".to_string(),
                "backups/sqlprod01/MSSQLSERVER/orders/orders_full_21072021.bak".to_string(),
            ],
            1024,
        );

        let key = resolve_object(&store, &mut request).await?;
        assert_eq!(
            key,
            "backups/sqlprod01/MSSQLSERVER/orders/orders_full_21072021.bak"
        );
        assert_eq!(
            request.file_name.as_deref(),
            Some("orders_full_21072021.bak")
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_no_date_match_is_a_resolution_error() {
        let mut request = sample_request();
        request.file_name = None;
        request.last_modified = Some("1012022".to_string());

        let store = MockStore::new(
            vec!["backups/sqlprod01/MSSQLSERVER/orders/orders_full_21072021.bak".to_string()],
            1024,
        );

        let err = resolve_object(&store, &mut request).await.unwrap_err();
        assert!(matches!(err, AppError::Resolution(_)));
    }

    #[tokio::test]
    async fn test_explicit_file_name_is_probed() -> anyhow::Result<()> {
        let mut request = sample_request();
        let store = MockStore::new(
            vec!["backups/sqlprod01/MSSQLSERVER/orders/orders_full_21072021.bak".to_string()],
            1024,
        );

        let key = resolve_object(&store, &mut request).await?;
        assert_eq!(
            key,
            "backups/sqlprod01/MSSQLSERVER/orders/orders_full_21072021.bak"
        );
        assert_eq!(store.probe_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_explicit_file_is_not_found() {
        let mut request = sample_request();
        request.file_name = Some("orders_full_99999999.bak".to_string());

        let store = MockStore::new(Vec::new(), 1024);
        let err = resolve_object(&store, &mut request).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
