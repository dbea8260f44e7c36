//! Request-scoped embed token types.

use chrono::{DateTime, Utc};

use crate::{DatasetId, ReportId, RoleSet};

/// Lifetime the embedding service documents for embed tokens.
const DOCUMENTED_TOKEN_LIFETIME_SECONDS: i64 = 3600;

/// Identity block attached to an embed token request for row-level security.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveIdentity {
    /// Username the service evaluates row filters against.
    pub username: String,
    /// Roles to apply.
    pub roles: RoleSet,
    /// Datasets the identity applies to.
    pub datasets: Vec<DatasetId>,
}

/// Token request for one report/dataset pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTokenRequest {
    /// Dataset backing the report.
    pub dataset_id: DatasetId,
    /// Report to embed.
    pub report_id: ReportId,
    /// Optional identity for row-level security.
    pub identity: Option<EffectiveIdentity>,
}

impl EmbedTokenRequest {
    /// Creates a request without an identity block.
    #[must_use]
    pub fn bare(report_id: ReportId, dataset_id: DatasetId) -> Self {
        Self {
            dataset_id,
            report_id,
            identity: None,
        }
    }

    /// Returns the same request carrying an identity for the request's dataset.
    #[must_use]
    pub fn with_identity(self, username: impl Into<String>, roles: RoleSet) -> Self {
        let datasets = vec![self.dataset_id.clone()];
        Self {
            identity: Some(EffectiveIdentity {
                username: username.into(),
                roles,
                datasets,
            }),
            ..self
        }
    }
}

/// Negotiated embed token handed to the client embedding script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedTokenResult {
    /// Signed embed token.
    pub token: String,
    /// Expiry reported by the embedding service, when present.
    pub expires_at: Option<DateTime<Utc>>,
    /// Whether an effective identity was attached.
    pub identity_applied: bool,
    /// Whether the attached identity carried only the default role because
    /// the user has no mapping for the dataset.
    pub default_role_applied: bool,
}

impl EmbedTokenResult {
    /// Seconds until expiry relative to `now`, defaulting to the documented
    /// lifetime when the service did not report one.
    #[must_use]
    pub fn expires_in_seconds(&self, now: DateTime<Utc>) -> i64 {
        self.expires_at
            .map(|expires_at| (expires_at - now).num_seconds().max(0))
            .unwrap_or(DOCUMENTED_TOKEN_LIFETIME_SECONDS)
    }
}

/// Report metadata exposed by the embedding service catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportSummary {
    /// Report identifier.
    pub id: ReportId,
    /// Human-readable report name.
    pub name: String,
    /// Dataset backing the report.
    pub dataset_id: DatasetId,
    /// URL the client embedding script loads.
    pub embed_url: String,
}
