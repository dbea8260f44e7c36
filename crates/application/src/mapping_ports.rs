use async_trait::async_trait;
use embedgate_core::AppResult;
use embedgate_domain::{ReportAccessMapping, RoleMapping};

/// Storage port for role mappings.
///
/// Reads return an atomic snapshot of the whole collection and writes replace
/// it. Adapters report read and write faults as
/// [`embedgate_core::AppError::StorageUnavailable`].
#[async_trait]
pub trait RoleMappingStore: Send + Sync {
    /// Reads every stored role mapping.
    async fn read_all_role_mappings(&self) -> AppResult<Vec<RoleMapping>>;

    /// Replaces the stored role mappings.
    async fn write_all_role_mappings(&self, mappings: Vec<RoleMapping>) -> AppResult<()>;
}

/// Storage port for report access mappings.
#[async_trait]
pub trait ReportAccessStore: Send + Sync {
    /// Reads every stored report access mapping.
    async fn read_all_report_access(&self) -> AppResult<Vec<ReportAccessMapping>>;

    /// Replaces the stored report access mappings.
    async fn write_all_report_access(&self, mappings: Vec<ReportAccessMapping>) -> AppResult<()>;
}
