//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod embed;
mod identity;
mod mapping;
mod roles;

pub use embed::{EffectiveIdentity, EmbedTokenRequest, EmbedTokenResult, ReportSummary};
pub use identity::{DatasetId, ReportId, UserEmail};
pub use mapping::{ReportAccessMapping, RoleMapping, select_effective_mapping};
pub use roles::{DEFAULT_ROLE, RoleSet};
