use std::net::SocketAddr;
use std::time::Duration;

use secrecy::SecretString;
use tracing::Level;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3002";
pub const DEFAULT_HEYGEN_BASE_URL: &str = "https://api.heygen.com";
pub const DEFAULT_RAG_API_URL: &str = "https://rag-super-agent.onrender.com/chat/";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub heygen_api_key: SecretString,
    pub heygen_base_url: String,
    pub rag_api_url: String,
    pub log_level: Level,
    /// Limit for calls to the avatar vendor.
    pub vendor_timeout: Duration,
    /// Limit for calls to the RAG backend, which can be slow to wake up.
    pub rag_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// This function will look for a `.env` file in the current directory
    /// and load the following variables:
    ///
    /// *   `BIND_ADDRESS`: The address and port to bind the server to. Defaults to "0.0.0.0:3002".
    /// *   `HEYGEN_API_KEY`: Your secret key for the HeyGen API. Required.
    /// *   `HEYGEN_BASE_URL`: (Optional) Defaults to "https://api.heygen.com".
    /// *   `RAG_API_URL`: (Optional) Full URL of the RAG chat endpoint.
    /// *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let heygen_api_key = lookup("HEYGEN_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingVar("HEYGEN_API_KEY".to_string()))?;

        let heygen_base_url = lookup("HEYGEN_BASE_URL")
            .unwrap_or_else(|| DEFAULT_HEYGEN_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let rag_api_url = lookup("RAG_API_URL").unwrap_or_else(|| DEFAULT_RAG_API_URL.to_string());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            bind_address,
            heygen_api_key,
            heygen_base_url,
            rag_api_url,
            log_level,
            vendor_timeout: Duration::from_secs(60),
            rag_timeout: Duration::from_secs(120),
        })
    }
}
