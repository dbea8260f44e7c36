use async_trait::async_trait;
use chrono::{DateTime, Utc};
use embedgate_core::AppResult;
use embedgate_domain::{DatasetId, EmbedTokenRequest, ReportId, ReportSummary};
use thiserror::Error;

/// Token issued by the embedding service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedEmbedToken {
    /// Signed embed token.
    pub token: String,
    /// Expiry reported by the service.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Answer from the token-generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateTokenResponse {
    /// HTTP 200 with a token.
    Issued(IssuedEmbedToken),
    /// Any non-200 answer, kept verbatim for diagnostics.
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },
}

/// Failure to obtain any answer from the token-generation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayFailure {
    /// The call exceeded its time bound.
    #[error("request timed out")]
    Timeout,
    /// The service principal could not authenticate.
    #[error("service authentication failed: {0}")]
    Authentication(String),
    /// Connection-level failure.
    #[error("transport error: {0}")]
    Transport(String),
    /// HTTP 200 whose body could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

/// Port for the embedding service's token-generation endpoint.
#[async_trait]
pub trait EmbedTokenGateway: Send + Sync {
    /// Requests one embed token. Performs exactly one outbound call.
    async fn generate_token(
        &self,
        request: &EmbedTokenRequest,
    ) -> Result<GenerateTokenResponse, GatewayFailure>;
}

/// Port for report metadata exposed by the embedding service.
#[async_trait]
pub trait ReportCatalog: Send + Sync {
    /// Lists every report in the configured workspace.
    async fn list_reports(&self) -> AppResult<Vec<ReportSummary>>;

    /// Fetches one report.
    async fn get_report(&self, report_id: &ReportId) -> AppResult<ReportSummary>;

    /// Lists role names defined on a dataset.
    ///
    /// Informational only: the service may answer with nothing even when
    /// roles exist, depending on caller permissions.
    async fn list_dataset_roles(&self, dataset_id: &DatasetId) -> AppResult<Vec<String>>;
}
