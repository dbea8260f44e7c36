use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use embedgate_core::AppError;
use tracing_subscriber::EnvFilter;

const DEFAULT_REDIRECT_URI: &str = "http://localhost:5000/auth/callback";
const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
const DEFAULT_EMBED_API_BASE_URL: &str = "https://api.powerbi.com/v1.0/myorg";
const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";
const DEFAULT_EMBED_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where role mappings and report access are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Postgres { database_url: String },
    JsonFiles { directory: PathBuf },
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub workspace_id: String,
    pub admin_emails: String,
    pub redirect_uri: String,
    pub frontend_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub storage: StorageConfig,
    pub cookie_secure: bool,
    pub embed_request_timeout: Duration,
    pub embed_api_base_url: String,
    pub authority_host: String,
    pub graph_base_url: String,
}

impl ApiConfig {
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");
        Self::from_lookup(migrate_only, |name| env::var(name).ok())
    }

    pub fn from_lookup(
        migrate_only: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, AppError> {
        let optional = |name: &str, default: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_owned())
        };

        let storage = match lookup("DATABASE_URL").filter(|value| !value.trim().is_empty()) {
            Some(database_url) => StorageConfig::Postgres { database_url },
            None => StorageConfig::JsonFiles {
                directory: PathBuf::from(optional("MAPPING_DIR", ".")),
            },
        };

        if migrate_only && !matches!(storage, StorageConfig::Postgres { .. }) {
            return Err(AppError::Validation(
                "DATABASE_URL is required to run migrations".to_owned(),
            ));
        }

        // Migrations need nothing but the database.
        let required = |name: &str| -> Result<String, AppError> {
            if migrate_only {
                return Ok(lookup(name).unwrap_or_default());
            }
            required_non_empty(name, lookup(name))
        };

        let api_port = optional("API_PORT", "5000")
            .parse::<u16>()
            .map_err(|error| AppError::Validation(format!("invalid API_PORT: {error}")))?;

        let embed_request_timeout_secs = lookup("EMBED_REQUEST_TIMEOUT_SECS")
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                value.trim().parse::<u64>().map_err(|error| {
                    AppError::Validation(format!("invalid EMBED_REQUEST_TIMEOUT_SECS: {error}"))
                })
            })
            .transpose()?
            .unwrap_or(DEFAULT_EMBED_REQUEST_TIMEOUT_SECS);
        if embed_request_timeout_secs == 0 {
            return Err(AppError::Validation(
                "EMBED_REQUEST_TIMEOUT_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            migrate_only,
            tenant_id: required("TENANT_ID")?,
            client_id: required("CLIENT_ID")?,
            client_secret: required("CLIENT_SECRET")?,
            workspace_id: required("WORKSPACE_ID")?,
            admin_emails: lookup("ADMIN_EMAILS").unwrap_or_default(),
            redirect_uri: optional("REDIRECT_URI", DEFAULT_REDIRECT_URI),
            frontend_url: optional("FRONTEND_URL", DEFAULT_FRONTEND_URL),
            api_host: optional("API_HOST", "127.0.0.1"),
            api_port,
            storage,
            cookie_secure: optional("SESSION_COOKIE_SECURE", "false").eq_ignore_ascii_case("true"),
            embed_request_timeout: Duration::from_secs(embed_request_timeout_secs),
            embed_api_base_url: optional("EMBED_API_BASE_URL", DEFAULT_EMBED_API_BASE_URL),
            authority_host: optional("AUTHORITY_HOST", DEFAULT_AUTHORITY_HOST),
            graph_base_url: optional("GRAPH_BASE_URL", DEFAULT_GRAPH_BASE_URL),
        })
    }

    pub fn socket_address(&self) -> Result<SocketAddr, AppError> {
        let host = IpAddr::from_str(&self.api_host).map_err(|error| {
            AppError::Internal(format!("invalid API_HOST '{}': {error}", self.api_host))
        })?;
        Ok(SocketAddr::from((host, self.api_port)))
    }
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_non_empty(name: &str, value: Option<String>) -> Result<String, AppError> {
    let value = value.ok_or_else(|| AppError::Validation(format!("{name} is required")))?;
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{name} must not be empty")));
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::time::Duration;

    use super::{ApiConfig, StorageConfig};

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
            .collect();
        move |name| values.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("TENANT_ID", "tenant"),
        ("CLIENT_ID", "client"),
        ("CLIENT_SECRET", "secret"),
        ("WORKSPACE_ID", "workspace"),
    ];

    #[test]
    fn defaults_apply_without_database() {
        let config = ApiConfig::from_lookup(false, lookup(&REQUIRED));

        let Ok(config) = config else {
            panic!("config should load");
        };
        assert_eq!(
            config.storage,
            StorageConfig::JsonFiles {
                directory: PathBuf::from(".")
            }
        );
        assert_eq!(config.api_port, 5000);
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.embed_request_timeout, Duration::from_secs(10));
        assert!(!config.cookie_secure);
    }

    #[test]
    fn database_url_selects_postgres_storage() {
        let mut values = REQUIRED.to_vec();
        values.push(("DATABASE_URL", "postgres://localhost/embedgate"));
        values.push(("EMBED_REQUEST_TIMEOUT_SECS", "3"));

        let config = ApiConfig::from_lookup(false, lookup(&values));

        assert!(matches!(
            config,
            Ok(ref value) if value.storage == StorageConfig::Postgres {
                database_url: "postgres://localhost/embedgate".to_owned()
            } && value.embed_request_timeout == Duration::from_secs(3)
        ));
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let config = ApiConfig::from_lookup(false, lookup(&REQUIRED[..3]));
        assert!(config.is_err());
    }

    #[test]
    fn migrate_requires_only_database() {
        let with_database = ApiConfig::from_lookup(
            true,
            lookup(&[("DATABASE_URL", "postgres://localhost/embedgate")]),
        );
        let without_database = ApiConfig::from_lookup(true, lookup(&[]));

        assert!(with_database.is_ok());
        assert!(without_database.is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut values = REQUIRED.to_vec();
        values.push(("EMBED_REQUEST_TIMEOUT_SECS", "0"));

        assert!(ApiConfig::from_lookup(false, lookup(&values)).is_err());
    }
}
