//! Test harness errors.

use thiserror::Error;

/// Errors raised by the harness itself, never by the code under test.
#[derive(Debug, Error)]
pub enum TestError {
    /// The request could not be built.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// The body is not UTF-8.
    #[error("body is not valid UTF-8: {0}")]
    BodyRead(#[from] std::string::FromUtf8Error),

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
