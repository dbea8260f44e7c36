use std::fmt::{Display, Formatter};

use embedgate_core::AppError;
use thiserror::Error;

/// Which token request a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegotiationAttempt {
    /// Request without an identity block.
    Bare,
    /// Request carrying the resolved effective identity.
    WithIdentity,
}

impl NegotiationAttempt {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bare => "bare",
            Self::WithIdentity => "with_identity",
        }
    }
}

impl Display for NegotiationAttempt {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Terminal negotiation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EmbedTokenError {
    /// Report, dataset or user input was blank.
    #[error("invalid embed token request: {0}")]
    InvalidInput(String),

    /// Role mappings could not be read, so no identity could be built.
    #[error("role mappings unavailable: {0}")]
    StorageUnavailable(String),

    /// The bare request was rejected for a reason other than a missing identity.
    #[error("embedding service rejected bare token request with status {status}: {body}")]
    BareRejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
    },

    /// The identity-bearing request was rejected.
    #[error(
        "embedding service rejected identity token request for dataset '{dataset_id}' with roles [{}] (status {status}): {body}",
        .roles.join(", ")
    )]
    IdentityRejected {
        /// HTTP status code.
        status: u16,
        /// Raw response body.
        body: String,
        /// Dataset the identity targeted.
        dataset_id: String,
        /// Roles that were attempted.
        roles: Vec<String>,
    },

    /// A token request exceeded its time bound.
    #[error("{attempt} token request timed out")]
    Timeout {
        /// Attempt that timed out.
        attempt: NegotiationAttempt,
    },

    /// A token request produced no usable answer.
    #[error("{attempt} token request failed: {message}")]
    Unreachable {
        /// Attempt that failed.
        attempt: NegotiationAttempt,
        /// Failure detail.
        message: String,
    },
}

impl EmbedTokenError {
    /// Returns the attempt the failure happened in, when one was sent.
    #[must_use]
    pub fn attempt(&self) -> Option<NegotiationAttempt> {
        match self {
            Self::InvalidInput(_) => None,
            Self::BareRejected { .. } => Some(NegotiationAttempt::Bare),
            Self::StorageUnavailable(_) | Self::IdentityRejected { .. } => {
                Some(NegotiationAttempt::WithIdentity)
            }
            Self::Timeout { attempt } | Self::Unreachable { attempt, .. } => Some(*attempt),
        }
    }
}

impl From<EmbedTokenError> for AppError {
    fn from(value: EmbedTokenError) -> Self {
        match value {
            EmbedTokenError::InvalidInput(message) => Self::Validation(message),
            EmbedTokenError::StorageUnavailable(message) => Self::StorageUnavailable(message),
            other => Self::Upstream(other.to_string()),
        }
    }
}
