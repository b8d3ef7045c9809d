//! Client errors.

use http::StatusCode;
use serde_json::Value;
use thiserror::Error;

/// Result type for client calls.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors returned by [`Client::invoke`](crate::Client::invoke).
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status.
    #[error("{status}: {message}")]
    Http {
        /// Status from the error envelope, or the response status.
        status: StatusCode,
        /// Message from the error envelope.
        message: String,
        /// Optional structured details from the error envelope.
        details: Option<Value>,
    },

    /// The client is not set up for this call. Raised before any network I/O.
    #[error("client configuration error: {0}")]
    Configuration(String),

    /// The request could not be encoded.
    #[error("failed to encode request: {0}")]
    Encode(String),

    /// The request never produced a response.
    #[error("transport error: {0}")]
    Transport(#[source] anyhow::Error),

    /// The success body did not match the declared response shape.
    #[error("failed to decode response ({status}): {message}")]
    Decode {
        /// Response status.
        status: StatusCode,
        /// Parser message.
        message: String,
    },
}

impl ClientError {
    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Creates a transport error from any source.
    #[must_use]
    pub fn transport(source: impl Into<anyhow::Error>) -> Self {
        Self::Transport(source.into())
    }

    /// Returns the HTTP status that best describes this error.
    ///
    /// Server errors report their own status. Local configuration and
    /// encoding failures report 500, and transport or decoding failures
    /// report 502.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            Self::Configuration(_) | Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport(_) | Self::Decode { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Returns the error details sent by the server, if any.
    #[must_use]
    pub const fn details(&self) -> Option<&Value> {
        match self {
            Self::Http { details, .. } => details.as_ref(),
            _ => None,
        }
    }

    /// Returns `true` if the server rejected the call with this status.
    #[must_use]
    pub fn is_status(&self, status: StatusCode) -> bool {
        matches!(self, Self::Http { status: s, .. } if *s == status)
    }
}
