use embedgate_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Role assigned to users without an explicit mapping for a dataset.
pub const DEFAULT_ROLE: &str = "Customer";

/// Ordered, duplicate-free set of role names presented to the embedding service.
///
/// Role names are opaque and passed through as-is; only surrounding whitespace
/// is removed. Insertion order is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    /// Creates a role set, rejecting empty collections and blank names.
    pub fn new<I, S>(roles: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut values: Vec<String> = Vec::new();
        for role in roles {
            let role = role.into();
            let trimmed = role.trim();
            if trimmed.is_empty() {
                return Err(AppError::Validation(
                    "role names must not be empty".to_owned(),
                ));
            }

            if !values.iter().any(|existing| existing == trimmed) {
                values.push(trimmed.to_owned());
            }
        }

        if values.is_empty() {
            return Err(AppError::Validation(
                "at least one role is required".to_owned(),
            ));
        }

        Ok(Self(values))
    }

    /// Returns the single-element default role set.
    #[must_use]
    pub fn default_roles() -> Self {
        Self(vec![DEFAULT_ROLE.to_owned()])
    }

    /// Returns the role names in order.
    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        self.0.as_slice()
    }

    /// Returns whether this is exactly the default role set.
    #[must_use]
    pub fn is_default(&self) -> bool {
        self.0.len() == 1 && self.0[0] == DEFAULT_ROLE
    }
}

impl TryFrom<Vec<String>> for RoleSet {
    type Error = AppError;

    fn try_from(value: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoleSet> for Vec<String> {
    fn from(value: RoleSet) -> Self {
        value.0
    }
}
