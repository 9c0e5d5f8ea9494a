//! Configuration for the HetrixTools exporter.

use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(#[from] json5::Error),
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Complete exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Inbound HTTP endpoint settings.
    #[serde(default)]
    pub web: WebConfig,

    /// Upstream HetrixTools API settings.
    #[serde(default)]
    pub hetrixtools: ApiConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics HTTP endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    /// Address to listen on (default: ":8080").
    ///
    /// A bare `:PORT` binds all IPv4 interfaces.
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Path for metrics endpoint (default: "/metrics").
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: String,
}

fn default_listen_address() -> String {
    ":8080".to_string()
}

fn default_telemetry_path() -> String {
    "/metrics".to_string()
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            telemetry_path: default_telemetry_path(),
        }
    }
}

impl WebConfig {
    /// Resolve the listen address into a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = &self.listen_address;
        let normalized = if addr.starts_with(':') {
            format!("0.0.0.0{}", addr)
        } else {
            addr.clone()
        };

        normalized
            .parse()
            .map_err(|_| ConfigError::Validation(format!("Invalid listen address: {}", addr)))
    }
}

/// HetrixTools API client configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Bearer token for the HetrixTools API.
    #[serde(default)]
    pub api_key: String,

    /// Uptime monitor listing endpoint.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Monitors requested per page (API maximum: 200).
    #[serde(default = "default_per_page")]
    pub per_page: u32,

    /// Upper bound on pages fetched per scrape (default: 1).
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Upstream request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Metric name prefix (default: "hetrixtools").
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

/// Largest page size the API accepts.
pub const MAX_PER_PAGE: u32 = 200;

fn default_base_url() -> String {
    "https://api.hetrixtools.com/v3/uptime-monitors".to_string()
}

fn default_per_page() -> u32 {
    MAX_PER_PAGE
}

fn default_max_pages() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    5
}

fn default_namespace() -> String {
    "hetrixtools".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            per_page: default_per_page(),
            max_pages: default_max_pages(),
            timeout_secs: default_timeout_secs(),
            namespace: default_namespace(),
        }
    }
}

impl ApiConfig {
    /// Request timeout as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("per_page", &self.per_page)
            .field("max_pages", &self.max_pages)
            .field("timeout_secs", &self.timeout_secs)
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl ExporterConfig {
    /// Load configuration from a JSON5 file.
    ///
    /// The result is not validated, since CLI flags may still supply the API key.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a JSON5 string.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(json5::from_str(content)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.hetrixtools.api_key.trim().is_empty() {
            return Err(ConfigError::Validation(
                "HetrixTools API key is required".to_string(),
            ));
        }

        self.web.socket_addr()?;

        if !self.web.telemetry_path.starts_with('/') {
            return Err(ConfigError::Validation(
                "Metrics path must start with /".to_string(),
            ));
        }

        if self.hetrixtools.per_page == 0 || self.hetrixtools.per_page > MAX_PER_PAGE {
            return Err(ConfigError::Validation(format!(
                "per_page must be between 1 and {}",
                MAX_PER_PAGE
            )));
        }

        if self.hetrixtools.max_pages == 0 {
            return Err(ConfigError::Validation(
                "max_pages must be > 0".to_string(),
            ));
        }

        if self.hetrixtools.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
