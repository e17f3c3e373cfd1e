// glacierrestore/src/manifest/mod.rs
use serde::Deserialize;
use std::path::Path;

use crate::errors::{AppError, Result};

/// Speed/cost tradeoff for a Glacier retrieval, as written in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RetrievalTier {
    Standard,
    Expedited,
    Bulk,
}

/// One row of the restore manifest (restore_list.csv).
///
/// `file_name` and `last_modified` are both optional, but at least one must be
/// present for the row to be actionable. When `file_name` is resolved from
/// `last_modified` it is written back into the request.
#[derive(Debug, Clone, Deserialize)]
pub struct RestoreRequest {
    pub s3_bucket_name: String,
    pub s3_backup_file_path: String,
    pub sql_server_name: String,
    pub sql_instance_name: String,
    pub sql_database_name: String,
    pub file_name: Option<String>,
    pub retrieval_tier: RetrievalTier,
    pub last_modified: Option<String>,
    pub email: String,
}

impl RestoreRequest {
    /// Key prefix under which this request's backup objects live:
    /// `{backup_path}/{server}/{instance}/{database}`.
    pub fn partial_prefix(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.s3_backup_file_path,
            self.sql_server_name,
            self.sql_instance_name,
            self.sql_database_name
        )
    }

    /// Short label for log lines before a file name is known.
    pub fn label(&self) -> String {
        match &self.file_name {
            Some(name) => name.clone(),
            None => self.partial_prefix(),
        }
    }

    fn normalize(mut self) -> Self {
        self.file_name = self.file_name.filter(|s| !s.trim().is_empty());
        self.last_modified = self.last_modified.filter(|s| !s.trim().is_empty());
        self
    }
}

/// Result of reading the manifest file. Malformed rows are kept aside with
/// their 1-based data row number so the batch can continue without them.
#[derive(Debug)]
pub struct LoadedManifest {
    pub records: Vec<RestoreRequest>,
    pub malformed: Vec<(usize, String)>,
}

/// Reads the CSV manifest. Only file-level I/O failures abort; a row that does
/// not parse (e.g. an unknown retrieval tier) is reported per-row.
pub fn load_manifest(path: &Path) -> Result<LoadedManifest> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| {
        AppError::Validation(format!(
            "Failed to open manifest file {}: {}",
            path.display(),
            e
        ))
    })?;

    let mut records = Vec::new();
    let mut malformed = Vec::new();
    for (idx, row) in reader.deserialize::<RestoreRequest>().enumerate() {
        match row {
            Ok(record) => records.push(record.normalize()),
            Err(e) => malformed.push((idx + 1, e.to_string())),
        }
    }
    Ok(LoadedManifest { records, malformed })
}

/// Field-level validation for one manifest row. Storage-side checks (does the
/// prefix exist in the bucket) live in the restore flow, next to the listing
/// they share with date resolution.
pub fn check_required_fields(request: &RestoreRequest) -> Result<()> {
    let required = [
        ("s3_bucket_name", &request.s3_bucket_name),
        ("s3_backup_file_path", &request.s3_backup_file_path),
        ("sql_server_name", &request.sql_server_name),
        ("sql_instance_name", &request.sql_instance_name),
        ("sql_database_name", &request.sql_database_name),
        ("email", &request.email),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(AppError::Validation(format!(
                "Required field '{}' is empty for restore of '{}'",
                field,
                request.label()
            )));
        }
    }

    if request.file_name.is_none() && request.last_modified.is_none() {
        return Err(AppError::Validation(format!(
            "Neither file_name nor last_modified was provided for database '{}'",
            request.sql_database_name
        )));
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) fn sample_request() -> RestoreRequest {
        RestoreRequest {
            s3_bucket_name: "corp-sql-backups".to_string(),
            s3_backup_file_path: "backups".to_string(),
            sql_server_name: "sqlprod01".to_string(),
            sql_instance_name: "MSSQLSERVER".to_string(),
            sql_database_name: "orders".to_string(),
            file_name: Some("orders_full_21072021.bak".to_string()),
            retrieval_tier: RetrievalTier::Standard,
            last_modified: None,
            email: "dba@example.com".to_string(),
        }
    }

    #[test]
    fn test_partial_prefix_layout() {
        let request = sample_request();
        assert_eq!(
            request.partial_prefix(),
            "backups/sqlprod01/MSSQLSERVER/orders"
        );
    }

    #[test]
    fn test_required_field_empty_is_rejected() {
        let mut request = sample_request();
        request.sql_server_name = "".to_string();

        let err = check_required_fields(&request).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert!(err.to_string().contains("sql_server_name"));
    }

    #[test]
    fn test_missing_both_file_name_and_last_modified_is_rejected() {
        let mut request = sample_request();
        request.file_name = None;
        request.last_modified = None;

        let err = check_required_fields(&request).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_last_modified_alone_is_sufficient() {
        let mut request = sample_request();
        request.file_name = None;
        request.last_modified = Some("7212021".to_string());

        assert!(check_required_fields(&request).is_ok());
    }

    #[test]
    fn test_load_manifest_parses_rows_and_isolates_malformed() -> anyhow::Result<()> {
        let mut file = tempfile::NamedTempFile::new()?;
        file.write_all(
            b"s3_bucket_name,s3_backup_file_path,sql_server_name,sql_instance_name,sql_database_name,file_name,retrieval_tier,last_modified,email\n\
              corp-sql-backups,backups,sqlprod01,MSSQLSERVER,orders,orders_full.bak,Standard,,dba@example.com\n\
              corp-sql-backups,backups,sqlprod01,MSSQLSERVER,billing,,Hyperspeed,7212021,dba@example.com\n\
              corp-sql-backups,backups,sqlprod02,MSSQLSERVER,crm,,Bulk,12012020,ops@example.com\n",
        )?;

        let manifest = load_manifest(file.path())?;
        assert_eq!(manifest.records.len(), 2);
        assert_eq!(manifest.malformed.len(), 1);
        assert_eq!(manifest.malformed[0].0, 2);

        let first = &manifest.records[0];
        assert_eq!(first.file_name.as_deref(), Some("orders_full.bak"));
        assert_eq!(first.last_modified, None);
        assert_eq!(first.retrieval_tier, RetrievalTier::Standard);

        let second = &manifest.records[1];
        assert_eq!(second.file_name, None);
        assert_eq!(second.last_modified.as_deref(), Some("12012020"));
        assert_eq!(second.retrieval_tier, RetrievalTier::Bulk);
        Ok(())
    }
}
