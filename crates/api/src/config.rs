//! Process configuration, read once from the environment at startup.

use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_AUTH_SERVICE_URL: &str = "https://auth.sua-fintech.com/api/v1/auth/validate";
pub const DEFAULT_AUTH_SERVICE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// `None` selects the in-memory ledger store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub internal_api_key: String,
    pub auth_service_url: String,
    pub auth_service_timeout: Duration,
}

// Secrets stay out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("database_url", &self.database_url.as_ref().map(|_| "<set>"))
            .field("database_max_connections", &self.database_max_connections)
            .field("internal_api_key", &"<redacted>")
            .field("auth_service_url", &self.auth_service_url)
            .field("auth_service_timeout", &self.auth_service_timeout)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the config from any variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let internal_api_key = get("INTERNAL_API_KEY").ok_or(ConfigError::Missing("INTERNAL_API_KEY"))?;

        Ok(Self {
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            database_url: get("DATABASE_URL"),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            internal_api_key,
            auth_service_url: get("AUTH_SERVICE_URL")
                .unwrap_or_else(|| DEFAULT_AUTH_SERVICE_URL.to_string()),
            auth_service_timeout: Duration::from_millis(parse_or(
                "AUTH_SERVICE_TIMEOUT_MS",
                get("AUTH_SERVICE_TIMEOUT_MS"),
                DEFAULT_AUTH_SERVICE_TIMEOUT_MS,
            )?),
        })
    }
}

fn parse_or<T>(name: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_api_key_is_set() {
        let cfg = config(&[("INTERNAL_API_KEY", "secret")]).unwrap();
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.database_url, None);
        assert_eq!(cfg.database_max_connections, 10);
        assert_eq!(cfg.auth_service_url, DEFAULT_AUTH_SERVICE_URL);
        assert_eq!(cfg.auth_service_timeout, Duration::from_secs(5));
    }

    #[test]
    fn api_key_is_required() {
        assert_eq!(config(&[]), Err(ConfigError::Missing("INTERNAL_API_KEY")));
        assert_eq!(
            config(&[("INTERNAL_API_KEY", "  ")]),
            Err(ConfigError::Missing("INTERNAL_API_KEY"))
        );
    }

    #[test]
    fn malformed_numbers_are_reported_by_name() {
        let err = config(&[("INTERNAL_API_KEY", "k"), ("PORT", "http")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = config(&[
            ("INTERNAL_API_KEY", "top-secret"),
            ("DATABASE_URL", "postgres://u:pw@db/loyalty"),
        ])
        .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("pw@db"));
    }
}
