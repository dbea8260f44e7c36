use std::sync::Arc;

use embedgate_core::{AppError, AppResult};
use embedgate_domain::{DatasetId, RoleSet, UserEmail, select_effective_mapping};

use crate::RoleMappingStore;

/// Resolves the roles presented to the embedding service for a user and dataset.
#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn RoleMappingStore>,
}

impl RoleResolver {
    /// Creates a resolver over a role mapping store.
    #[must_use]
    pub fn new(store: Arc<dyn RoleMappingStore>) -> Self {
        Self { store }
    }

    /// Returns the explicitly mapped roles, or the default role set when the
    /// user has no mapping for the dataset.
    ///
    /// Every call re-reads the store. A failed read is reported as
    /// [`AppError::StorageUnavailable`] and never degrades to the default.
    pub async fn resolve(&self, user_email: &str, dataset_id: &str) -> AppResult<RoleSet> {
        let user_email = UserEmail::new(user_email)?;
        let dataset_id = DatasetId::new(dataset_id)?;
        self.resolve_for(&user_email, &dataset_id).await
    }

    pub(crate) async fn resolve_for(
        &self,
        user_email: &UserEmail,
        dataset_id: &DatasetId,
    ) -> AppResult<RoleSet> {
        let mappings = self
            .store
            .read_all_role_mappings()
            .await
            .map_err(|error| match error {
                AppError::StorageUnavailable(message) => AppError::StorageUnavailable(message),
                other => AppError::StorageUnavailable(other.to_string()),
            })?;

        Ok(select_effective_mapping(&mappings, user_email, dataset_id)
            .map(|mapping| mapping.roles().clone())
            .unwrap_or_else(RoleSet::default_roles))
    }
}
