use async_trait::async_trait;
use chrono::{DateTime, Utc};
use embedgate_application::{ReportAccessStore, RoleMappingStore};
use embedgate_core::{AppError, AppResult};
use embedgate_domain::{
    DatasetId, ReportAccessMapping, ReportId, RoleMapping, RoleSet, UserEmail,
};
use sqlx::{FromRow, PgPool};
use tracing::warn;

/// PostgreSQL-backed implementation of the mapping store ports.
#[derive(Clone)]
pub struct PostgresMappingStore {
    pool: PgPool,
}

impl PostgresMappingStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RoleMappingRow {
    user_email: String,
    dataset_id: String,
    roles: Vec<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ReportAccessRow {
    user_email: String,
    report_ids: Vec<String>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RoleMappingRow> for RoleMapping {
    type Error = AppError;

    fn try_from(row: RoleMappingRow) -> Result<Self, Self::Error> {
        Ok(RoleMapping::new(
            UserEmail::new(row.user_email)?,
            DatasetId::new(row.dataset_id)?,
            RoleSet::new(row.roles)?,
            row.created_by,
            row.created_at,
        ))
    }
}

impl TryFrom<ReportAccessRow> for ReportAccessMapping {
    type Error = AppError;

    fn try_from(row: ReportAccessRow) -> Result<Self, Self::Error> {
        let report_ids = row
            .report_ids
            .into_iter()
            .map(ReportId::new)
            .collect::<AppResult<Vec<_>>>()?;

        Ok(ReportAccessMapping::new(
            UserEmail::new(row.user_email)?,
            report_ids,
            row.created_by,
            row.created_at,
        ))
    }
}

fn storage_error(context: &str, error: sqlx::Error) -> AppError {
    AppError::StorageUnavailable(format!("{context}: {error}"))
}

/// Converts rows into domain mappings, skipping rows that fail validation.
fn keep_valid_rows<R, M>(table: &str, rows: Vec<R>) -> Vec<M>
where
    M: TryFrom<R, Error = AppError>,
{
    rows.into_iter()
        .enumerate()
        .filter_map(|(index, row)| match M::try_from(row) {
            Ok(mapping) => Some(mapping),
            Err(error) => {
                warn!(table, index, %error, "skipping invalid mapping row");
                None
            }
        })
        .collect()
}

#[async_trait]
impl RoleMappingStore for PostgresMappingStore {
    async fn read_all_role_mappings(&self) -> AppResult<Vec<RoleMapping>> {
        let rows = sqlx::query_as::<_, RoleMappingRow>(
            r#"
            SELECT user_email, dataset_id, roles, created_by, created_at
            FROM role_mappings
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("failed to read role mappings", error))?;

        Ok(keep_valid_rows("role_mappings", rows))
    }

    async fn write_all_role_mappings(&self, mappings: Vec<RoleMapping>) -> AppResult<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_error("failed to begin transaction", error))?;

        sqlx::query("DELETE FROM role_mappings")
            .execute(&mut *transaction)
            .await
            .map_err(|error| storage_error("failed to clear role mappings", error))?;

        for mapping in &mappings {
            sqlx::query(
                r#"
                INSERT INTO role_mappings (user_email, dataset_id, roles, created_by, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(mapping.user_email().as_str())
            .bind(mapping.dataset_id().as_str())
            .bind(mapping.roles().as_slice())
            .bind(mapping.created_by())
            .bind(mapping.created_at())
            .execute(&mut *transaction)
            .await
            .map_err(|error| storage_error("failed to insert role mapping", error))?;
        }

        transaction
            .commit()
            .await
            .map_err(|error| storage_error("failed to commit role mappings", error))
    }
}

#[async_trait]
impl ReportAccessStore for PostgresMappingStore {
    async fn read_all_report_access(&self) -> AppResult<Vec<ReportAccessMapping>> {
        let rows = sqlx::query_as::<_, ReportAccessRow>(
            r#"
            SELECT user_email, report_ids, created_by, created_at
            FROM report_access
            ORDER BY position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| storage_error("failed to read report access", error))?;

        Ok(keep_valid_rows("report_access", rows))
    }

    async fn write_all_report_access(&self, mappings: Vec<ReportAccessMapping>) -> AppResult<()> {
        let mut transaction = self
            .pool
            .begin()
            .await
            .map_err(|error| storage_error("failed to begin transaction", error))?;

        sqlx::query("DELETE FROM report_access")
            .execute(&mut *transaction)
            .await
            .map_err(|error| storage_error("failed to clear report access", error))?;

        for mapping in &mappings {
            let report_ids: Vec<&str> = mapping
                .report_ids()
                .iter()
                .map(ReportId::as_str)
                .collect();

            sqlx::query(
                r#"
                INSERT INTO report_access (user_email, report_ids, created_by, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(mapping.user_email().as_str())
            .bind(report_ids)
            .bind(mapping.created_by())
            .bind(mapping.created_at())
            .execute(&mut *transaction)
            .await
            .map_err(|error| storage_error("failed to insert report access", error))?;
        }

        transaction
            .commit()
            .await
            .map_err(|error| storage_error("failed to commit report access", error))
    }
}
