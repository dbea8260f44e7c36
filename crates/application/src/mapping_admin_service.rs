use std::sync::Arc;

use chrono::Utc;
use embedgate_core::{AppResult, UserIdentity};
use embedgate_domain::{
    DatasetId, ReportAccessMapping, ReportId, RoleMapping, RoleSet, UserEmail,
};
use tokio::sync::Mutex;

use crate::{AdminPolicy, ReportAccessStore, RoleMappingStore};

/// Input payload for saving a role mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRoleMappingInput {
    /// User the roles apply to.
    pub user_email: String,
    /// Dataset the roles apply to.
    pub dataset_id: String,
    /// Roles to assign.
    pub roles: Vec<String>,
}

/// Input payload for saving a report access mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReportAccessInput {
    /// User the reports are assigned to.
    pub user_email: String,
    /// Reports the user may list and open.
    pub report_ids: Vec<String>,
}

/// Administrative service for maintaining user mappings.
#[derive(Clone)]
pub struct MappingAdminService {
    admin_policy: AdminPolicy,
    role_store: Arc<dyn RoleMappingStore>,
    report_access_store: Arc<dyn ReportAccessStore>,
    write_lock: Arc<Mutex<()>>,
}

impl MappingAdminService {
    /// Creates a new mapping administration service.
    #[must_use]
    pub fn new(
        admin_policy: AdminPolicy,
        role_store: Arc<dyn RoleMappingStore>,
        report_access_store: Arc<dyn ReportAccessStore>,
    ) -> Self {
        Self {
            admin_policy,
            role_store,
            report_access_store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Lists stored role mappings.
    pub async fn list_role_mappings(&self, actor: &UserIdentity) -> AppResult<Vec<RoleMapping>> {
        self.admin_policy.require_admin(actor)?;
        self.role_store.read_all_role_mappings().await
    }

    /// Saves a role mapping, replacing any mapping for the same user and dataset.
    pub async fn save_role_mapping(
        &self,
        actor: &UserIdentity,
        input: SaveRoleMappingInput,
    ) -> AppResult<RoleMapping> {
        self.admin_policy.require_admin(actor)?;

        let user_email = UserEmail::new(input.user_email)?;
        let dataset_id = DatasetId::new(input.dataset_id)?;
        let roles = RoleSet::new(input.roles)?;
        let mapping = RoleMapping::new(user_email, dataset_id, roles, actor.email(), Utc::now());

        let _guard = self.write_lock.lock().await;
        let mut mappings = self.role_store.read_all_role_mappings().await?;
        mappings.retain(|existing| !existing.applies_to(mapping.user_email(), mapping.dataset_id()));
        mappings.push(mapping.clone());
        self.role_store.write_all_role_mappings(mappings).await?;

        Ok(mapping)
    }

    /// Deletes role mappings for a user, limited to one dataset when given.
    /// Returns the number of removed mappings.
    pub async fn delete_role_mapping(
        &self,
        actor: &UserIdentity,
        user_email: &str,
        dataset_id: Option<&str>,
    ) -> AppResult<usize> {
        self.admin_policy.require_admin(actor)?;

        let user_email = UserEmail::new(user_email)?;
        let dataset_id = dataset_id
            .filter(|value| !value.trim().is_empty())
            .map(DatasetId::new)
            .transpose()?;

        let _guard = self.write_lock.lock().await;
        let mut mappings = self.role_store.read_all_role_mappings().await?;
        let before = mappings.len();
        mappings.retain(|existing| match &dataset_id {
            Some(dataset_id) => !existing.applies_to(&user_email, dataset_id),
            None => existing.user_email() != &user_email,
        });
        let removed = before - mappings.len();

        if removed > 0 {
            self.role_store.write_all_role_mappings(mappings).await?;
        }

        Ok(removed)
    }

    /// Lists stored report access mappings.
    pub async fn list_report_access(
        &self,
        actor: &UserIdentity,
    ) -> AppResult<Vec<ReportAccessMapping>> {
        self.admin_policy.require_admin(actor)?;
        self.report_access_store.read_all_report_access().await
    }

    /// Saves the reports assigned to a user, replacing the previous assignment.
    pub async fn save_report_access(
        &self,
        actor: &UserIdentity,
        input: SaveReportAccessInput,
    ) -> AppResult<ReportAccessMapping> {
        self.admin_policy.require_admin(actor)?;

        let user_email = UserEmail::new(input.user_email)?;
        let report_ids = input
            .report_ids
            .into_iter()
            .map(ReportId::new)
            .collect::<AppResult<Vec<_>>>()?;
        let mapping = ReportAccessMapping::new(user_email, report_ids, actor.email(), Utc::now());

        let _guard = self.write_lock.lock().await;
        let mut mappings = self.report_access_store.read_all_report_access().await?;
        mappings.retain(|existing| existing.user_email() != mapping.user_email());
        mappings.push(mapping.clone());
        self.report_access_store
            .write_all_report_access(mappings)
            .await?;

        Ok(mapping)
    }

    /// Deletes a user's report access. Returns the number of removed mappings.
    pub async fn delete_report_access(
        &self,
        actor: &UserIdentity,
        user_email: &str,
    ) -> AppResult<usize> {
        self.admin_policy.require_admin(actor)?;

        let user_email = UserEmail::new(user_email)?;

        let _guard = self.write_lock.lock().await;
        let mut mappings = self.report_access_store.read_all_report_access().await?;
        let before = mappings.len();
        mappings.retain(|existing| existing.user_email() != &user_email);
        let removed = before - mappings.len();

        if removed > 0 {
            self.report_access_store
                .write_all_report_access(mappings)
                .await?;
        }

        Ok(removed)
    }
}

#[cfg(test)]
mod tests;
