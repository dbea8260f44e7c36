//! Flat-file mapping storage.
//!
//! Each collection lives in its own JSON array file. Writes go to a temporary
//! sibling file that is renamed over the target, so readers always observe a
//! complete snapshot. Callers serialize writers; the store itself holds no
//! lock.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use embedgate_application::{ReportAccessStore, RoleMappingStore};
use embedgate_core::{AppError, AppResult};
use embedgate_domain::{
    DatasetId, ReportAccessMapping, ReportId, RoleMapping, RoleSet, UserEmail,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// File name of the role mapping collection.
pub const ROLE_MAPPINGS_FILE: &str = "rls-config.json";

/// File name of the report access collection.
pub const REPORT_ACCESS_FILE: &str = "reports-access.json";

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleMappingRecord {
    user_email: String,
    #[serde(default)]
    dataset_id: String,
    roles: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    created_by: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportAccessRecord {
    user_email: String,
    report_ids: Vec<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    created_by: String,
}

/// JSON file implementation of the mapping store ports.
#[derive(Debug)]
pub struct JsonFileMappingStore {
    role_mappings_path: PathBuf,
    report_access_path: PathBuf,
}

impl JsonFileMappingStore {
    /// Creates a store keeping both collection files in `directory`.
    #[must_use]
    pub fn new(directory: impl AsRef<Path>) -> Self {
        let directory = directory.as_ref();
        Self {
            role_mappings_path: directory.join(ROLE_MAPPINGS_FILE),
            report_access_path: directory.join(REPORT_ACCESS_FILE),
        }
    }

    async fn write_records<T: Serialize>(&self, path: &Path, records: &[T]) -> AppResult<()> {
        let encoded = serde_json::to_vec_pretty(records).map_err(|error| {
            AppError::Internal(format!("failed to encode '{}': {error}", path.display()))
        })?;

        let temporary_path = path.with_extension("json.tmp");
        tokio::fs::write(&temporary_path, encoded)
            .await
            .map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "failed to write '{}': {error}",
                    temporary_path.display()
                ))
            })?;
        tokio::fs::rename(&temporary_path, path)
            .await
            .map_err(|error| {
                AppError::StorageUnavailable(format!(
                    "failed to replace '{}': {error}",
                    path.display()
                ))
            })
    }
}

/// Reads one collection file. Records that do not decode or fail validation
/// are skipped with a warning; only I/O and JSON syntax faults fail the read.
async fn read_records<T, U>(path: &Path, convert: fn(T) -> AppResult<U>) -> AppResult<Vec<U>>
where
    T: DeserializeOwned,
{
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(error) => {
            return Err(AppError::StorageUnavailable(format!(
                "failed to read '{}': {error}",
                path.display()
            )));
        }
    };

    let values: Vec<serde_json::Value> = serde_json::from_slice(&bytes).map_err(|error| {
        AppError::StorageUnavailable(format!("failed to decode '{}': {error}", path.display()))
    })?;

    Ok(values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| {
            let converted = serde_json::from_value::<T>(value)
                .map_err(|error| AppError::Validation(error.to_string()))
                .and_then(convert);
            match converted {
                Ok(mapping) => Some(mapping),
                Err(error) => {
                    warn!(
                        path = %path.display(),
                        index,
                        %error,
                        "skipping invalid mapping record"
                    );
                    None
                }
            }
        })
        .collect())
}

/// Parses stored timestamps. Older files carry naive UTC timestamps without an
/// offset; missing or unreadable values sort as the oldest possible entry.
fn parse_created_at(value: Option<&str>) -> DateTime<Utc> {
    let Some(value) = value.filter(|value| !value.trim().is_empty()) else {
        return DateTime::<Utc>::MIN_UTC;
    };

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Utc);
    }

    match NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(parsed) => parsed.and_utc(),
        Err(error) => {
            warn!(value, %error, "unreadable mapping timestamp, treating as oldest");
            DateTime::<Utc>::MIN_UTC
        }
    }
}

fn format_created_at(value: DateTime<Utc>) -> Option<String> {
    (value != DateTime::<Utc>::MIN_UTC).then(|| value.to_rfc3339())
}

fn role_mapping_from_record(record: RoleMappingRecord) -> AppResult<RoleMapping> {
    Ok(RoleMapping::new(
        UserEmail::new(record.user_email)?,
        DatasetId::new(record.dataset_id)?,
        RoleSet::new(record.roles)?,
        record.created_by,
        parse_created_at(record.created_at.as_deref()),
    ))
}

fn role_mapping_to_record(mapping: &RoleMapping) -> RoleMappingRecord {
    RoleMappingRecord {
        user_email: mapping.user_email().as_str().to_owned(),
        dataset_id: mapping.dataset_id().as_str().to_owned(),
        roles: mapping.roles().as_slice().to_vec(),
        created_at: format_created_at(mapping.created_at()),
        created_by: mapping.created_by().to_owned(),
    }
}

fn report_access_from_record(record: ReportAccessRecord) -> AppResult<ReportAccessMapping> {
    let report_ids = record
        .report_ids
        .into_iter()
        .map(ReportId::new)
        .collect::<AppResult<Vec<_>>>()?;

    Ok(ReportAccessMapping::new(
        UserEmail::new(record.user_email)?,
        report_ids,
        record.created_by,
        parse_created_at(record.created_at.as_deref()),
    ))
}

fn report_access_to_record(mapping: &ReportAccessMapping) -> ReportAccessRecord {
    ReportAccessRecord {
        user_email: mapping.user_email().as_str().to_owned(),
        report_ids: mapping
            .report_ids()
            .iter()
            .map(|report_id| report_id.as_str().to_owned())
            .collect(),
        created_at: format_created_at(mapping.created_at()),
        created_by: mapping.created_by().to_owned(),
    }
}

#[async_trait]
impl RoleMappingStore for JsonFileMappingStore {
    async fn read_all_role_mappings(&self) -> AppResult<Vec<RoleMapping>> {
        read_records(&self.role_mappings_path, role_mapping_from_record).await
    }

    async fn write_all_role_mappings(&self, mappings: Vec<RoleMapping>) -> AppResult<()> {
        let records: Vec<RoleMappingRecord> =
            mappings.iter().map(role_mapping_to_record).collect();
        self.write_records(&self.role_mappings_path, &records).await
    }
}

#[async_trait]
impl ReportAccessStore for JsonFileMappingStore {
    async fn read_all_report_access(&self) -> AppResult<Vec<ReportAccessMapping>> {
        read_records(&self.report_access_path, report_access_from_record).await
    }

    async fn write_all_report_access(&self, mappings: Vec<ReportAccessMapping>) -> AppResult<()> {
        let records: Vec<ReportAccessRecord> =
            mappings.iter().map(report_access_to_record).collect();
        self.write_records(&self.report_access_path, &records).await
    }
}
