//! Extraction error types.
//!
//! Errors raised while turning raw request parts into a validated request
//! value. Every variant converts into a [`CovenantError`] so the dispatcher
//! can render it with the standard envelope.

use covenant_core::{CovenantError, FieldIssues};
use http::StatusCode;
use std::fmt;
use thiserror::Error;

/// Where the offending data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionSource {
    /// Path parameters (e.g. `/users/:id`).
    Path,
    /// Query string parameters.
    Query,
    /// JSON request body.
    Body,
    /// The merged request object.
    Merged,
}

impl fmt::Display for ExtractionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "path"),
            Self::Query => write!(f, "query"),
            Self::Body => write!(f, "body"),
            Self::Merged => write!(f, "request"),
        }
    }
}

/// Error that occurs while merging or validating a request.
///
/// # Example
///
/// ```rust
/// use covenant_extract::{ExtractionError, ExtractionSource};
/// use http::StatusCode;
///
/// let err = ExtractionError::malformed(ExtractionSource::Query, "invalid percent-encoding");
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// assert!(err.to_string().contains("query"));
/// ```
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// A request part could not be parsed at all.
    #[error("malformed {location}: {message}")]
    Malformed {
        /// Which part was malformed.
        location: ExtractionSource,
        /// Parser message.
        message: String,
    },

    /// The merged object did not deserialize into the request type.
    #[error("invalid request: {message}")]
    Deserialize {
        /// Deserializer message (e.g. ``missing field `email` ``).
        message: String,
    },

    /// The request type's validation rejected the value.
    #[error("validation failed: {issues}")]
    Validation {
        /// Per-field problems.
        issues: FieldIssues,
    },

    /// The body exceeded the configured limit.
    #[error("payload too large: max {max} bytes, got {actual} bytes")]
    PayloadTooLarge {
        /// Configured limit.
        max: usize,
        /// Observed size (at least `max + 1`).
        actual: usize,
    },
}

impl ExtractionError {
    /// Creates an error for an unparseable request part.
    #[must_use]
    pub fn malformed(location: ExtractionSource, message: impl Into<String>) -> Self {
        Self::Malformed {
            location,
            message: message.into(),
        }
    }

    /// Creates an error for a payload that's too large.
    #[must_use]
    pub const fn payload_too_large(max: usize, actual: usize) -> Self {
        Self::PayloadTooLarge { max, actual }
    }

    /// Returns the appropriate HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Malformed { .. } | Self::Deserialize { .. } | Self::Validation { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<ExtractionError> for CovenantError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Validation { issues } => {
                Self::validation_with_issues("Invalid request", issues)
            }
            ExtractionError::PayloadTooLarge { .. } => {
                Self::http(StatusCode::PAYLOAD_TOO_LARGE, error.to_string())
            }
            other => Self::validation(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::ErrorCategory;

    #[test]
    fn test_deserialize_error_is_generic_validation() {
        let err: CovenantError = ExtractionError::Deserialize {
            message: "missing field `email`".into(),
        }
        .into();

        assert_eq!(err.category(), ErrorCategory::Validation);
        let envelope = err.to_envelope();
        assert_eq!(envelope.status, 400);
        assert!(envelope.message.contains("email"));
        assert!(envelope.details.is_none());
    }

    #[test]
    fn test_validation_error_carries_issues() {
        let mut issues = FieldIssues::new();
        issues.add("email", "must be an email address");

        let err: CovenantError = ExtractionError::Validation { issues }.into();
        let envelope = err.to_envelope();
        assert_eq!(envelope.message, "Invalid request");
        assert_eq!(envelope.details.unwrap()[0]["path"], "email");
    }

    #[test]
    fn test_payload_too_large() {
        let err = ExtractionError::payload_too_large(1024, 2048);
        assert_eq!(err.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(err.to_string().contains("1024"));

        let converted: CovenantError = err.into();
        assert_eq!(converted.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn test_extraction_source_display() {
        assert_eq!(ExtractionSource::Path.to_string(), "path");
        assert_eq!(ExtractionSource::Query.to_string(), "query");
        assert_eq!(ExtractionSource::Body.to_string(), "body");
        assert_eq!(ExtractionSource::Merged.to_string(), "request");
    }
}
