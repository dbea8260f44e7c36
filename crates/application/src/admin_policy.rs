use embedgate_core::{AppError, AppResult, UserIdentity};
use embedgate_domain::UserEmail;

/// Administrator allow-list configured at startup.
#[derive(Debug, Clone, Default)]
pub struct AdminPolicy {
    admins: Vec<UserEmail>,
}

impl AdminPolicy {
    /// Creates a policy from raw admin emails. Blank entries are ignored.
    #[must_use]
    pub fn new<I, S>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let admins = admin_emails
            .into_iter()
            .filter_map(|value| UserEmail::new(value).ok())
            .collect();

        Self { admins }
    }

    /// Parses a comma-separated admin list.
    #[must_use]
    pub fn from_comma_separated(value: &str) -> Self {
        Self::new(value.split(','))
    }

    /// Returns whether the identity is an administrator.
    #[must_use]
    pub fn is_admin(&self, identity: &UserIdentity) -> bool {
        self.admins.iter().any(|admin| admin.matches(identity.email()))
    }

    /// Ensures the identity is an administrator.
    pub fn require_admin(&self, identity: &UserIdentity) -> AppResult<()> {
        if self.is_admin(identity) {
            return Ok(());
        }

        Err(AppError::Forbidden(format!(
            "'{}' is not an administrator",
            identity.email()
        )))
    }
}
