use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use embedgate_application::{
    EmbedTokenGateway, GatewayFailure, GenerateTokenResponse, IssuedEmbedToken, ReportCatalog,
};
use embedgate_core::{AppError, AppResult};
use embedgate_domain::{DatasetId, EmbedTokenRequest, ReportId, ReportSummary};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ServicePrincipalTokenProvider;

/// Connection settings for the embedding REST API.
#[derive(Debug, Clone)]
pub struct PowerBiClientConfig {
    /// API base URL, e.g. `https://api.powerbi.com/v1.0/myorg`.
    pub api_base_url: String,
    /// Workspace (group) holding the reports.
    pub workspace_id: String,
    /// Upper bound for every outbound call.
    pub request_timeout: Duration,
}

/// REST client for the embedding service.
pub struct PowerBiClient {
    http_client: reqwest::Client,
    token_provider: Arc<ServicePrincipalTokenProvider>,
    config: PowerBiClientConfig,
}

#[derive(Debug, Serialize)]
struct GenerateTokenPayload<'a> {
    datasets: Vec<ObjectReference<'a>>,
    reports: Vec<ObjectReference<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    identities: Vec<IdentityPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct ObjectReference<'a> {
    id: &'a str,
}

#[derive(Debug, Serialize)]
struct IdentityPayload<'a> {
    username: &'a str,
    roles: &'a [String],
    datasets: Vec<&'a str>,
}

impl<'a> GenerateTokenPayload<'a> {
    fn from_request(request: &'a EmbedTokenRequest) -> Self {
        let identities = request
            .identity
            .iter()
            .map(|identity| IdentityPayload {
                username: identity.username.as_str(),
                roles: identity.roles.as_slice(),
                datasets: identity.datasets.iter().map(DatasetId::as_str).collect(),
            })
            .collect();

        Self {
            datasets: vec![ObjectReference {
                id: request.dataset_id.as_str(),
            }],
            reports: vec![ObjectReference {
                id: request.report_id.as_str(),
            }],
            identities,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateTokenBody {
    token: String,
    #[serde(default)]
    expiration: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRecord {
    id: String,
    name: String,
    dataset_id: String,
    embed_url: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct DatasetRoleRecord {
    name: String,
}

impl TryFrom<ReportRecord> for ReportSummary {
    type Error = AppError;

    fn try_from(record: ReportRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ReportId::new(record.id)?,
            name: record.name,
            dataset_id: DatasetId::new(record.dataset_id)?,
            embed_url: record.embed_url,
        })
    }
}

impl PowerBiClient {
    /// Creates a new embedding service client.
    #[must_use]
    pub fn new(
        http_client: reqwest::Client,
        token_provider: Arc<ServicePrincipalTokenProvider>,
        config: PowerBiClientConfig,
    ) -> Self {
        Self {
            http_client,
            token_provider,
            config,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.api_base_url.trim_end_matches('/'))
    }

    fn workspace_url(&self, path: &str) -> String {
        self.api_url(&format!("groups/{}/{path}", self.config.workspace_id))
    }

    async fn get_workspace_resource(&self, path: &str) -> AppResult<(StatusCode, String)> {
        let access_token = self
            .token_provider
            .access_token()
            .await
            .map_err(|error| AppError::Upstream(error.to_string()))?;
        let response = self
            .http_client
            .get(self.workspace_url(path))
            .bearer_auth(access_token)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|error| {
                AppError::Upstream(format!("embedding service request failed: {error}"))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            AppError::Upstream(format!("failed to read embedding service response: {error}"))
        })?;
        Ok((status, body))
    }
}

fn decode<T: for<'de> Deserialize<'de>>(body: &str, what: &str) -> AppResult<T> {
    serde_json::from_str(body)
        .map_err(|error| AppError::Upstream(format!("failed to decode {what}: {error}")))
}

#[async_trait]
impl EmbedTokenGateway for PowerBiClient {
    async fn generate_token(
        &self,
        request: &EmbedTokenRequest,
    ) -> Result<GenerateTokenResponse, GatewayFailure> {
        let access_token = self.token_provider.access_token().await?;

        let payload = GenerateTokenPayload::from_request(request);
        debug!(
            report_id = %request.report_id,
            dataset_id = %request.dataset_id,
            with_identity = request.identity.is_some(),
            "requesting embed token"
        );

        let response = self
            .http_client
            .post(self.api_url("GenerateToken"))
            .bearer_auth(access_token)
            .timeout(self.config.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    GatewayFailure::Timeout
                } else {
                    GatewayFailure::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            if error.is_timeout() {
                GatewayFailure::Timeout
            } else {
                GatewayFailure::Transport(error.to_string())
            }
        })?;

        if status != StatusCode::OK {
            return Ok(GenerateTokenResponse::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let decoded = serde_json::from_str::<GenerateTokenBody>(&body)
            .map_err(|error| GatewayFailure::MalformedResponse(error.to_string()))?;

        Ok(GenerateTokenResponse::Issued(IssuedEmbedToken {
            token: decoded.token,
            expires_at: decoded.expiration,
        }))
    }
}

#[async_trait]
impl ReportCatalog for PowerBiClient {
    async fn list_reports(&self) -> AppResult<Vec<ReportSummary>> {
        let (status, body) = self.get_workspace_resource("reports").await?;
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "failed to list reports (status {status}): {body}"
            )));
        }

        decode::<ListEnvelope<ReportRecord>>(&body, "report list")?
            .value
            .into_iter()
            .map(ReportSummary::try_from)
            .collect()
    }

    async fn get_report(&self, report_id: &ReportId) -> AppResult<ReportSummary> {
        let (status, body) = self
            .get_workspace_resource(&format!("reports/{report_id}"))
            .await?;

        if status == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!(
                "report '{report_id}' does not exist"
            )));
        }
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "failed to fetch report '{report_id}' (status {status}): {body}"
            )));
        }

        ReportSummary::try_from(decode::<ReportRecord>(&body, "report")?)
    }

    async fn list_dataset_roles(&self, dataset_id: &DatasetId) -> AppResult<Vec<String>> {
        let (status, body) = self
            .get_workspace_resource(&format!("datasets/{dataset_id}/roles"))
            .await?;

        if !status.is_success() {
            warn!(%dataset_id, %status, "dataset roles unavailable");
            return Ok(Vec::new());
        }

        Ok(decode::<ListEnvelope<DatasetRoleRecord>>(&body, "dataset roles")?
            .value
            .into_iter()
            .map(|role| role.name)
            .collect())
    }
}
