//! Structured logging for Covenant services.
//!
//! Covenant logs through the [`tracing`] macros. This crate installs the
//! subscriber that turns those events into output: JSON lines for
//! production, a pretty multi-line format for development.
//!
//! # Example
//!
//! ```rust,ignore
//! use covenant_telemetry::{init_logging, LogConfig};
//!
//! init_logging(&LogConfig::development())?;
//! tracing::info!(operation = "createUser", "handling request");
//! ```

#![doc(html_root_url = "https://docs.rs/covenant-telemetry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod logging;

pub use error::TelemetryError;
pub use logging::{create_env_filter, init_logging, LogConfig, LogFormat};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
