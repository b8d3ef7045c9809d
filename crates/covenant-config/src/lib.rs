//! Typed configuration for Covenant.
//!
//! Configuration is layered, later layers overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. A TOML or JSON file
//! 3. A `.env` file
//! 4. `COVENANT__SECTION__KEY` environment variables
//!
//! Unknown fields are rejected so that typos fail loudly.
//!
//! # Example
//!
//! ```no_run
//! use covenant_config::ConfigLoader;
//!
//! # fn main() -> Result<(), covenant_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_optional_file("covenant.toml")?
//!     .with_dotenv()?
//!     .with_env_prefix("COVENANT")
//!     .load()?;
//!
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_ms = 30000
//! max_body_bytes = 1048576
//! shutdown_timeout_secs = 30
//! signature_tolerance_secs = 300
//!
//! [client]
//! base_url = "https://api.example.com"
//! app_id = "billing"
//! timeout_ms = 10000
//!
//! [rate_limit]
//! backend = "redis"
//! redis_url = "redis://127.0.0.1/"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::CovenantConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{
    ClientSettings, LoggingSettings, RateLimitBackend, RateLimitSettings, ServerSettings,
};
