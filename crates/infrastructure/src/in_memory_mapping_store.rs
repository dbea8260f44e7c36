use async_trait::async_trait;
use embedgate_application::{ReportAccessStore, RoleMappingStore};
use embedgate_core::AppResult;
use embedgate_domain::{ReportAccessMapping, RoleMapping};
use tokio::sync::RwLock;

/// In-memory mapping store for development and tests.
#[derive(Debug, Default)]
pub struct InMemoryMappingStore {
    role_mappings: RwLock<Vec<RoleMapping>>,
    report_access: RwLock<Vec<ReportAccessMapping>>,
}

impl InMemoryMappingStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store seeded with role mappings.
    #[must_use]
    pub fn with_role_mappings(role_mappings: Vec<RoleMapping>) -> Self {
        Self {
            role_mappings: RwLock::new(role_mappings),
            report_access: RwLock::new(Vec::new()),
        }
    }
}

#[async_trait]
impl RoleMappingStore for InMemoryMappingStore {
    async fn read_all_role_mappings(&self) -> AppResult<Vec<RoleMapping>> {
        Ok(self.role_mappings.read().await.clone())
    }

    async fn write_all_role_mappings(&self, mappings: Vec<RoleMapping>) -> AppResult<()> {
        *self.role_mappings.write().await = mappings;
        Ok(())
    }
}

#[async_trait]
impl ReportAccessStore for InMemoryMappingStore {
    async fn read_all_report_access(&self) -> AppResult<Vec<ReportAccessMapping>> {
        Ok(self.report_access.read().await.clone())
    }

    async fn write_all_report_access(&self, mappings: Vec<ReportAccessMapping>) -> AppResult<()> {
        *self.report_access.write().await = mappings;
        Ok(())
    }
}
