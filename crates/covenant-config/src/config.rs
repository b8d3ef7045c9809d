//! Root configuration type.

use serde::{Deserialize, Serialize};

use crate::{
    ClientSettings, ConfigError, LoggingSettings, RateLimitBackend, RateLimitSettings,
    ServerSettings,
};
use covenant_telemetry::LogFormat;

/// Complete Covenant configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use covenant_config::CovenantConfig;
///
/// let config = CovenantConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct CovenantConfig {
    /// Host server settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Client invoker settings.
    #[serde(default)]
    pub client: ClientSettings,

    /// Rate limiter settings.
    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl CovenantConfig {
    /// Development preset: pretty debug logs on localhost.
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.http_addr = "127.0.0.1:8080".to_string();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Validates cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::invalid_value(
                "server.max_body_bytes",
                "must be greater than zero",
            ));
        }

        let base_url = &self.client.base_url;
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ConfigError::invalid_value(
                "client.base_url",
                format!("expected an http(s) URL, got {base_url}"),
            ));
        }

        if self.rate_limit.backend == RateLimitBackend::Redis && self.rate_limit.redis_url.is_none()
        {
            return Err(ConfigError::invalid_value(
                "rate_limit.redis_url",
                "required when backend is 'redis'",
            ));
        }

        Ok(())
    }
}
