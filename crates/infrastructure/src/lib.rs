//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod entra_identity_provider;
mod in_memory_mapping_store;
mod json_file_mapping_store;
mod postgres_mapping_store;
mod power_bi_client;
mod service_principal_token_provider;

pub use entra_identity_provider::{EntraIdentityConfig, EntraIdentityProvider};
pub use in_memory_mapping_store::InMemoryMappingStore;
pub use json_file_mapping_store::{JsonFileMappingStore, REPORT_ACCESS_FILE, ROLE_MAPPINGS_FILE};
pub use postgres_mapping_store::PostgresMappingStore;
pub use power_bi_client::{PowerBiClient, PowerBiClientConfig};
pub use service_principal_token_provider::{
    EMBEDDING_API_SCOPE, ServicePrincipalConfig, ServicePrincipalTokenProvider,
};
