//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com/v1";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub log_level: Level,
    pub deepseek_api_key: String,
    pub deepseek_api_base: String,
    pub chat_model: String,
    pub embedding_model: String,
    pub public_app_url: String,
    pub clerk_webhook_secret: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingVar(key.to_string()))
        };
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        // --- Server and Database Settings ---
        let bind_address_str = or_default("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = required("DATABASE_URL")?;

        let max_connections_str = or_default("DB_MAX_CONNECTIONS", "5");
        let db_max_connections = max_connections_str.parse::<u32>().map_err(|e| {
            ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string(), e.to_string())
        })?;

        let log_level_str = or_default("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- AI Vendor ---
        // Required at startup, not at first use.
        let deepseek_api_key = required("DEEPSEEK_API_KEY")?;
        let deepseek_api_base = or_default("DEEPSEEK_API_BASE", DEFAULT_API_BASE);
        let chat_model = or_default("CHAT_MODEL", "deepseek-chat");
        let embedding_model = or_default("EMBEDDING_MODEL", "deepseek-embed");

        // --- Web Surface ---
        let public_app_url = or_default("PUBLIC_APP_URL", "http://localhost:3000");
        let clerk_webhook_secret = lookup("CLERK_WEBHOOK_SECRET").filter(|s| !s.is_empty());

        Ok(Self {
            bind_address,
            database_url,
            db_max_connections,
            log_level,
            deepseek_api_key,
            deepseek_api_base,
            chat_model,
            embedding_model,
            public_app_url,
            clerk_webhook_secret,
        })
    }
}
