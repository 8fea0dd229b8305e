//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    #[serde(default)]
    pub session: SessionConfig,
    pub feed: FeedConfig,
    pub logging: LoggingConfig,
}

/// Ingest service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 8080)
    pub port: u16,
    /// Public domain (e.g., "clips.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the public base URL of the service
    ///
    /// # Returns
    /// Full URL like "https://clips.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }
}

/// Hosted backend (BaaS) connection
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Project URL, e.g. "https://abcd.supabase.co"
    pub url: String,
    /// Public anon key sent as `apikey` on every request
    pub anon_key: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
}

/// Where the client keeps its persisted session
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SessionConfig {
    /// Directory for persisted session/auth state.
    ///
    /// In-memory only when omitted.
    pub storage_dir: Option<PathBuf>,
}

/// Feed listing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    /// Default row limit for video listings (default: 50)
    pub default_limit: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Log format: "pretty" or "json"
    pub format: String,
}

impl LoggingConfig {
    /// Filter used when `RUST_LOG` is not set
    pub fn default_directive(&self) -> String {
        format!("clipfeed={level},tower_http={level}", level = self.level)
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl BackendConfig {
    /// True when the backend is reached without TLS
    pub fn is_plain_http(&self) -> bool {
        self.url.starts_with("http://")
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (CLIPFEED__*)
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.domain", "localhost")?
            .set_default("server.protocol", "http")?
            .set_default("backend.timeout_seconds", 30)?
            .set_default("feed.default_limit", 50)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("CLIPFEED")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    fn validate(&self) -> Result<(), crate::error::AppError> {
        let backend_url = url::Url::parse(&self.backend.url).map_err(|e| {
            crate::error::AppError::Config(format!("backend.url is not a valid URL: {e}"))
        })?;
        if !matches!(backend_url.scheme(), "http" | "https") {
            return Err(crate::error::AppError::Config(
                "backend.url must use http or https".to_string(),
            ));
        }

        if self.backend.anon_key.trim().is_empty() {
            return Err(crate::error::AppError::Config(
                "backend.anon_key must not be empty".to_string(),
            ));
        }

        if self.feed.default_limit == 0 {
            return Err(crate::error::AppError::Config(
                "feed.default_limit must be greater than 0".to_string(),
            ));
        }

        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(crate::error::AppError::Config(format!(
                "logging.level must be one of trace, debug, info, warn, error (got {})",
                self.logging.level
            )));
        }

        Ok(())
    }
}
