//! Configuration schema types.
//!
//! One struct per section. Every field has a default, so any section (or
//! the whole file) may be omitted.

use covenant_telemetry::{LogConfig, LogFormat};
use serde::{Deserialize, Serialize};

/// Server section.
///
/// # Example
///
/// ```
/// use covenant_config::ServerSettings;
///
/// let settings = ServerSettings::default();
/// assert_eq!(settings.http_addr, "0.0.0.0:8080");
/// assert_eq!(settings.signature_tolerance_secs, 300);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Bind address (e.g. `"0.0.0.0:8080"`).
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,

    /// Largest accepted request body in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Accepted clock skew for signed server-to-server calls, in seconds.
    #[serde(default = "default_signature_tolerance")]
    pub signature_tolerance_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            request_timeout_ms: default_request_timeout(),
            max_body_bytes: default_max_body_bytes(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            signature_tolerance_secs: default_signature_tolerance(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30_000
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_signature_tolerance() -> u64 {
    300
}

/// Client section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientSettings {
    /// Base URL every contract path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Application id sent on signed server-to-server calls.
    #[serde(default)]
    pub app_id: Option<String>,

    /// Transport timeout in milliseconds.
    #[serde(default = "default_client_timeout")]
    pub timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: None,
            timeout_ms: default_client_timeout(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_client_timeout() -> u64 {
    10_000
}

/// Where rate-limit counters live.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// In-process counters. Not shared between instances.
    #[default]
    Memory,
    /// Redis counters shared by every instance.
    Redis,
}

/// Rate limit section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct RateLimitSettings {
    /// Counter store.
    #[serde(default)]
    pub backend: RateLimitBackend,

    /// Connection URL, required for the Redis backend.
    #[serde(default)]
    pub redis_url: Option<String>,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Whether logging is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive.
    #[serde(default = "default_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingSettings {
    /// Converts to the telemetry crate's configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            format: self.format,
            file_line_info: self.format == LogFormat::Pretty,
            ..LogConfig::default()
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_defaults_from_empty_table() {
        let settings: ServerSettings = toml::from_str("").unwrap();
        assert_eq!(settings, ServerSettings::default());
        assert_eq!(settings.max_body_bytes, 1_048_576);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<ServerSettings, _> = toml::from_str("port = 80");
        assert!(result.is_err());
    }

    #[test]
    fn test_rate_limit_backend_parse() {
        let settings: RateLimitSettings =
            toml::from_str("backend = \"redis\"\nredis_url = \"redis://127.0.0.1/\"").unwrap();
        assert_eq!(settings.backend, RateLimitBackend::Redis);
        assert_eq!(settings.redis_url.as_deref(), Some("redis://127.0.0.1/"));
    }

    #[test]
    fn test_logging_to_log_config() {
        let settings = LoggingSettings {
            enabled: true,
            level: "debug".into(),
            format: LogFormat::Pretty,
        };
        let config = settings.to_log_config();
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.file_line_info);
    }
}
