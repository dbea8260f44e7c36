//! Two-attempt embed token negotiation.
//!
//! The bare request is sent first. Only a rejection whose body says the
//! dataset requires an effective identity leads to a second request carrying
//! the user's resolved roles. Every other outcome is terminal, and the second
//! request is never followed by a third.

use std::sync::Arc;

use embedgate_core::AppError;
use embedgate_domain::{
    DatasetId, EmbedTokenRequest, EmbedTokenResult, ReportId, RoleSet, UserEmail,
};

use crate::{EmbedTokenGateway, GatewayFailure, GenerateTokenResponse, RoleResolver};

mod error;

pub use error::{EmbedTokenError, NegotiationAttempt};

const EFFECTIVE_IDENTITY_MARKER: &str = "requires effective identity";

/// Returns whether a rejection body asks for an effective identity.
#[must_use]
pub fn requires_effective_identity(body: &str) -> bool {
    body.to_lowercase().contains(EFFECTIVE_IDENTITY_MARKER)
}

/// Negotiates embed tokens against the embedding service.
#[derive(Clone)]
pub struct TokenNegotiator {
    gateway: Arc<dyn EmbedTokenGateway>,
    role_resolver: RoleResolver,
}

impl TokenNegotiator {
    /// Creates a negotiator from a token gateway and role resolver.
    #[must_use]
    pub fn new(gateway: Arc<dyn EmbedTokenGateway>, role_resolver: RoleResolver) -> Self {
        Self {
            gateway,
            role_resolver,
        }
    }

    /// Obtains an embed token for the report, attaching an effective identity
    /// only when the service demands one.
    pub async fn negotiate(
        &self,
        report_id: &str,
        dataset_id: &str,
        user_email: &str,
    ) -> Result<EmbedTokenResult, EmbedTokenError> {
        let report_id = ReportId::new(report_id).map_err(invalid_input)?;
        let dataset_id = DatasetId::new(dataset_id).map_err(invalid_input)?;
        let user_email = UserEmail::new(user_email).map_err(invalid_input)?;

        let bare_request = EmbedTokenRequest::bare(report_id, dataset_id.clone());
        match self.attempt(&bare_request, NegotiationAttempt::Bare).await? {
            GenerateTokenResponse::Issued(issued) => {
                return Ok(EmbedTokenResult {
                    token: issued.token,
                    expires_at: issued.expires_at,
                    identity_applied: false,
                    default_role_applied: false,
                });
            }
            GenerateTokenResponse::Rejected { status, body }
                if !requires_effective_identity(&body) =>
            {
                return Err(EmbedTokenError::BareRejected { status, body });
            }
            GenerateTokenResponse::Rejected { .. } => {}
        }

        let roles = self
            .role_resolver
            .resolve_for(&user_email, &dataset_id)
            .await
            .map_err(|error| match error {
                AppError::StorageUnavailable(message) => EmbedTokenError::StorageUnavailable(message),
                other => EmbedTokenError::StorageUnavailable(other.to_string()),
            })?;

        let identity_request = bare_request.with_identity(user_email.as_str(), roles.clone());
        match self
            .attempt(&identity_request, NegotiationAttempt::WithIdentity)
            .await?
        {
            GenerateTokenResponse::Issued(issued) => Ok(EmbedTokenResult {
                token: issued.token,
                expires_at: issued.expires_at,
                identity_applied: true,
                default_role_applied: roles.is_default(),
            }),
            GenerateTokenResponse::Rejected { status, body } => {
                Err(identity_rejected(status, body, dataset_id, &roles))
            }
        }
    }

    async fn attempt(
        &self,
        request: &EmbedTokenRequest,
        attempt: NegotiationAttempt,
    ) -> Result<GenerateTokenResponse, EmbedTokenError> {
        self.gateway
            .generate_token(request)
            .await
            .map_err(|failure| match failure {
                GatewayFailure::Timeout => EmbedTokenError::Timeout { attempt },
                other => EmbedTokenError::Unreachable {
                    attempt,
                    message: other.to_string(),
                },
            })
    }
}

fn invalid_input(error: AppError) -> EmbedTokenError {
    EmbedTokenError::InvalidInput(error.to_string())
}

fn identity_rejected(
    status: u16,
    body: String,
    dataset_id: DatasetId,
    roles: &RoleSet,
) -> EmbedTokenError {
    EmbedTokenError::IdentityRejected {
        status,
        body,
        dataset_id: dataset_id.as_str().to_owned(),
        roles: roles.as_slice().to_vec(),
    }
}

#[cfg(test)]
mod tests;
