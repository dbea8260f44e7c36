use std::sync::Arc;

use embedgate_core::{AppError, AppResult, UserIdentity};
use embedgate_domain::{DatasetId, ReportAccessMapping, ReportId, ReportSummary, UserEmail};

use crate::{AdminPolicy, ReportAccessStore, ReportCatalog};

/// Application service for report listing and the open check.
#[derive(Clone)]
pub struct ReportService {
    admin_policy: AdminPolicy,
    catalog: Arc<dyn ReportCatalog>,
    report_access_store: Arc<dyn ReportAccessStore>,
}

impl ReportService {
    /// Creates a new report service.
    #[must_use]
    pub fn new(
        admin_policy: AdminPolicy,
        catalog: Arc<dyn ReportCatalog>,
        report_access_store: Arc<dyn ReportAccessStore>,
    ) -> Self {
        Self {
            admin_policy,
            catalog,
            report_access_store,
        }
    }

    /// Returns whether the identity is an administrator.
    #[must_use]
    pub fn is_admin(&self, identity: &UserIdentity) -> bool {
        self.admin_policy.is_admin(identity)
    }

    /// Returns the report ids assigned to a user, empty when unmapped.
    pub async fn allowed_report_ids(&self, user_email: &str) -> AppResult<Vec<ReportId>> {
        let user_email = UserEmail::new(user_email)?;
        let mappings = self.report_access_store.read_all_report_access().await?;

        Ok(effective_access(&mappings, &user_email)
            .map(|mapping| mapping.report_ids().to_vec())
            .unwrap_or_default())
    }

    /// Lists catalog reports assigned to the identity.
    pub async fn list_my_reports(&self, identity: &UserIdentity) -> AppResult<Vec<ReportSummary>> {
        let allowed = self.allowed_report_ids(identity.email()).await?;
        if allowed.is_empty() {
            return Ok(Vec::new());
        }

        let reports = self.catalog.list_reports().await?;
        Ok(reports
            .into_iter()
            .filter(|report| allowed.contains(&report.id))
            .collect())
    }

    /// Lists every catalog report. Administrators only.
    pub async fn list_all_reports(&self, identity: &UserIdentity) -> AppResult<Vec<ReportSummary>> {
        self.admin_policy.require_admin(identity)?;
        self.catalog.list_reports().await
    }

    /// Lists role names defined on a dataset. Administrators only.
    pub async fn dataset_roles(
        &self,
        identity: &UserIdentity,
        dataset_id: &str,
    ) -> AppResult<Vec<String>> {
        self.admin_policy.require_admin(identity)?;
        let dataset_id = DatasetId::new(dataset_id)?;
        self.catalog.list_dataset_roles(&dataset_id).await
    }

    /// Loads a report the identity is allowed to open.
    ///
    /// Administrators may open any report; other users only those assigned to
    /// them.
    pub async fn open_report(
        &self,
        identity: &UserIdentity,
        report_id: &str,
    ) -> AppResult<ReportSummary> {
        let report_id = ReportId::new(report_id)?;

        if !self.admin_policy.is_admin(identity) {
            let allowed = self.allowed_report_ids(identity.email()).await?;
            if !allowed.contains(&report_id) {
                return Err(AppError::Forbidden(format!(
                    "report '{report_id}' is not assigned to '{}'",
                    identity.email()
                )));
            }
        }

        self.catalog.get_report(&report_id).await
    }
}

fn effective_access<'a>(
    mappings: &'a [ReportAccessMapping],
    user_email: &UserEmail,
) -> Option<&'a ReportAccessMapping> {
    mappings
        .iter()
        .filter(|mapping| mapping.user_email() == user_email)
        .fold(None, |best: Option<&ReportAccessMapping>, candidate| match best {
            Some(current) if current.created_at() >= candidate.created_at() => Some(current),
            _ => Some(candidate),
        })
}
