//! Console Configuration Module
//!
//! Loads the console's settings from the environment (and a `.env` file, if
//! present). Command-line flags are applied on top by the binary.

use std::env;
use tracing::Level;

/// Where the backend gateway runs when nothing else is configured.
pub const DEFAULT_GATEWAY_BASE_URL: &str = "http://localhost:3002";
/// The avatar vendor's public API.
pub const DEFAULT_HEYGEN_API_BASE: &str = "https://api.heygen.com";

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway_base_url: String,
    pub heygen_api_base: String,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `GATEWAY_BASE_URL`: (Optional) Backend gateway. Defaults to "http://localhost:3002".
    // *   `HEYGEN_API_BASE`: (Optional) Vendor streaming API. Defaults to "https://api.heygen.com".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let gateway_base_url = lookup("GATEWAY_BASE_URL")
            .unwrap_or_else(|| DEFAULT_GATEWAY_BASE_URL.to_string());
        let heygen_api_base =
            lookup("HEYGEN_API_BASE").unwrap_or_else(|| DEFAULT_HEYGEN_API_BASE.to_string());

        for (name, value) in [
            ("GATEWAY_BASE_URL", &gateway_base_url),
            ("HEYGEN_API_BASE", &heygen_api_base),
        ] {
            if !value.starts_with("http://") && !value.starts_with("https://") {
                return Err(ConfigError::InvalidValue(
                    name.to_string(),
                    format!("'{}' is not an http(s) url", value),
                ));
            }
        }

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            gateway_base_url,
            heygen_api_base,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.gateway_base_url, DEFAULT_GATEWAY_BASE_URL);
        assert_eq!(config.heygen_api_base, DEFAULT_HEYGEN_API_BASE);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn rejects_bad_values() {
        let err = Config::from_lookup(lookup(&[("RUST_LOG", "chatty")])).unwrap_err();
        assert!(err.to_string().contains("RUST_LOG"));

        let err = Config::from_lookup(lookup(&[("GATEWAY_BASE_URL", "localhost:3002")])).unwrap_err();
        assert!(err.to_string().contains("GATEWAY_BASE_URL"));
    }
}
