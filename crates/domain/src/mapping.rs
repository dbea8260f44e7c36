//! Administrator-maintained user mappings.

use chrono::{DateTime, Utc};

use crate::{DatasetId, ReportId, RoleSet, UserEmail};

/// Explicit role assignment for one user on one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMapping {
    user_email: UserEmail,
    dataset_id: DatasetId,
    roles: RoleSet,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl RoleMapping {
    /// Creates a role mapping.
    #[must_use]
    pub fn new(
        user_email: UserEmail,
        dataset_id: DatasetId,
        roles: RoleSet,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_email,
            dataset_id,
            roles,
            created_by: created_by.into(),
            created_at,
        }
    }

    /// Returns the mapped user.
    #[must_use]
    pub fn user_email(&self) -> &UserEmail {
        &self.user_email
    }

    /// Returns the dataset the roles apply to.
    #[must_use]
    pub fn dataset_id(&self) -> &DatasetId {
        &self.dataset_id
    }

    /// Returns the mapped roles.
    #[must_use]
    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    /// Returns the administrator that wrote the mapping.
    #[must_use]
    pub fn created_by(&self) -> &str {
        self.created_by.as_str()
    }

    /// Returns when the mapping was written.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns whether the mapping targets the given user and dataset.
    #[must_use]
    pub fn applies_to(&self, user_email: &UserEmail, dataset_id: &DatasetId) -> bool {
        &self.user_email == user_email && &self.dataset_id == dataset_id
    }
}

/// Picks the effective mapping for a user and dataset.
///
/// Storage does not enforce uniqueness, so duplicates are resolved by taking
/// the most recently created record; equal timestamps keep the earliest entry
/// in collection order.
#[must_use]
pub fn select_effective_mapping<'a>(
    mappings: &'a [RoleMapping],
    user_email: &UserEmail,
    dataset_id: &DatasetId,
) -> Option<&'a RoleMapping> {
    mappings
        .iter()
        .filter(|mapping| mapping.applies_to(user_email, dataset_id))
        .fold(None, |best: Option<&RoleMapping>, candidate| match best {
            Some(current) if current.created_at >= candidate.created_at => Some(current),
            _ => Some(candidate),
        })
}

/// Reports a user may list and open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAccessMapping {
    user_email: UserEmail,
    report_ids: Vec<ReportId>,
    created_by: String,
    created_at: DateTime<Utc>,
}

impl ReportAccessMapping {
    /// Creates a report access mapping. Duplicate report ids are dropped.
    #[must_use]
    pub fn new(
        user_email: UserEmail,
        report_ids: impl IntoIterator<Item = ReportId>,
        created_by: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut unique: Vec<ReportId> = Vec::new();
        for report_id in report_ids {
            if !unique.contains(&report_id) {
                unique.push(report_id);
            }
        }

        Self {
            user_email,
            report_ids: unique,
            created_by: created_by.into(),
            created_at,
        }
    }

    /// Returns the mapped user.
    #[must_use]
    pub fn user_email(&self) -> &UserEmail {
        &self.user_email
    }

    /// Returns the reports assigned to the user.
    #[must_use]
    pub fn report_ids(&self) -> &[ReportId] {
        self.report_ids.as_slice()
    }

    /// Returns the administrator that wrote the mapping.
    #[must_use]
    pub fn created_by(&self) -> &str {
        self.created_by.as_str()
    }

    /// Returns when the mapping was written.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns whether the report is assigned to the user.
    #[must_use]
    pub fn allows(&self, report_id: &ReportId) -> bool {
        self.report_ids.contains(report_id)
    }
}
