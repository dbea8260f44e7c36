use chrono::{DateTime, Utc};
use embedgate_core::UserIdentity;
use embedgate_domain::{EmbedTokenResult, ReportAccessMapping, ReportSummary, RoleMapping};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Health response payload.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/health-response.ts"
)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage: &'static str,
}

/// API representation of the authenticated user.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/user-identity-response.ts"
)]
pub struct UserIdentityResponse {
    pub email: String,
    pub display_name: String,
    pub is_admin: bool,
}

impl UserIdentityResponse {
    #[must_use]
    pub fn from_identity(identity: &UserIdentity, is_admin: bool) -> Self {
        Self {
            email: identity.email().to_owned(),
            display_name: identity.display_name().to_owned(),
            is_admin,
        }
    }
}

/// API representation of a workspace report.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/report-response.ts"
)]
pub struct ReportResponse {
    pub id: String,
    pub name: String,
    pub dataset_id: String,
    pub embed_url: String,
}

impl From<ReportSummary> for ReportResponse {
    fn from(value: ReportSummary) -> Self {
        Self {
            id: value.id.as_str().to_owned(),
            name: value.name,
            dataset_id: value.dataset_id.as_str().to_owned(),
            embed_url: value.embed_url,
        }
    }
}

/// Embed configuration handed to the client embedding script.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/embed-token-response.ts"
)]
pub struct EmbedTokenResponse {
    pub report_id: String,
    pub report_name: String,
    pub embed_url: String,
    pub token: String,
    pub identity_applied: bool,
    pub expires_at: Option<String>,
    #[ts(type = "number")]
    pub expires_in_seconds: i64,
}

impl EmbedTokenResponse {
    #[must_use]
    pub fn new(report: ReportSummary, result: EmbedTokenResult, now: DateTime<Utc>) -> Self {
        let expires_in_seconds = result.expires_in_seconds(now);
        Self {
            report_id: report.id.as_str().to_owned(),
            report_name: report.name,
            embed_url: report.embed_url,
            token: result.token,
            identity_applied: result.identity_applied,
            expires_at: result.expires_at.map(|value| value.to_rfc3339()),
            expires_in_seconds,
        }
    }
}

/// Role names defined on a dataset.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/dataset-roles-response.ts"
)]
pub struct DatasetRolesResponse {
    pub dataset_id: String,
    pub roles: Vec<String>,
}

/// API representation of a role mapping.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/role-mapping-response.ts"
)]
pub struct RoleMappingResponse {
    pub user_email: String,
    pub dataset_id: String,
    pub roles: Vec<String>,
    pub created_by: String,
    pub created_at: String,
}

impl From<RoleMapping> for RoleMappingResponse {
    fn from(value: RoleMapping) -> Self {
        Self {
            user_email: value.user_email().as_str().to_owned(),
            dataset_id: value.dataset_id().as_str().to_owned(),
            roles: value.roles().as_slice().to_vec(),
            created_by: value.created_by().to_owned(),
            created_at: value.created_at().to_rfc3339(),
        }
    }
}

/// Incoming payload for saving a role mapping.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-role-mapping-request.ts"
)]
pub struct SaveRoleMappingRequest {
    pub user_email: String,
    pub dataset_id: String,
    pub roles: Vec<String>,
}

/// Incoming payload for deleting role mappings.
///
/// Without a dataset every mapping of the user is removed.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/delete-role-mapping-request.ts"
)]
pub struct DeleteRoleMappingRequest {
    pub user_email: String,
    #[serde(default)]
    pub dataset_id: Option<String>,
}

/// API representation of a report access mapping.
#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/report-access-response.ts"
)]
pub struct ReportAccessResponse {
    pub user_email: String,
    pub report_ids: Vec<String>,
    pub created_by: String,
    pub created_at: String,
}

impl From<ReportAccessMapping> for ReportAccessResponse {
    fn from(value: ReportAccessMapping) -> Self {
        Self {
            user_email: value.user_email().as_str().to_owned(),
            report_ids: value
                .report_ids()
                .iter()
                .map(|report_id| report_id.as_str().to_owned())
                .collect(),
            created_by: value.created_by().to_owned(),
            created_at: value.created_at().to_rfc3339(),
        }
    }
}

/// Incoming payload for saving report access.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/save-report-access-request.ts"
)]
pub struct SaveReportAccessRequest {
    pub user_email: String,
    pub report_ids: Vec<String>,
}

/// Incoming payload for deleting report access.
#[derive(Debug, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/delete-report-access-request.ts"
)]
pub struct DeleteReportAccessRequest {
    pub user_email: String,
}

/// Number of mappings removed by a delete request.
#[derive(Debug, Serialize, TS)]
#[ts(
    export,
    export_to = "../../../packages/api-types/src/generated/delete-response.ts"
)]
pub struct DeleteResponse {
    pub removed: u32,
}
