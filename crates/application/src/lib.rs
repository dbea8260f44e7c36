//! Application services and ports.

#![forbid(unsafe_code)]

mod admin_policy;
mod embedding_ports;
mod identity_ports;
mod mapping_admin_service;
mod mapping_ports;
mod report_service;
mod role_resolver;
mod token_negotiator;

pub use admin_policy::AdminPolicy;
pub use embedding_ports::{
    EmbedTokenGateway, GatewayFailure, GenerateTokenResponse, IssuedEmbedToken, ReportCatalog,
};
pub use identity_ports::IdentityProvider;
pub use mapping_admin_service::{
    MappingAdminService, SaveReportAccessInput, SaveRoleMappingInput,
};
pub use mapping_ports::{ReportAccessStore, RoleMappingStore};
pub use report_service::ReportService;
pub use role_resolver::RoleResolver;
pub use token_negotiator::{
    EmbedTokenError, NegotiationAttempt, TokenNegotiator, requires_effective_identity,
};
