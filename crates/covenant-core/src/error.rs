//! Error types for Covenant.
//!
//! This module provides [`CovenantError`], the error every handler and every
//! stage of the dispatch pipeline returns, and [`ErrorEnvelope`], the JSON
//! shape it takes on the wire:
//!
//! ```json
//! { "status": 400, "message": "Invalid request", "details": [{"path": "email", "message": "required"}] }
//! ```
//!
//! The client parses the same envelope back into its own error type, so the
//! two sides agree on status, message and details.

use crate::FieldIssues;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using [`CovenantError`].
pub type CovenantResult<T> = Result<T, CovenantError>;

/// Message sent in place of internal error details.
const GENERIC_MESSAGE: &str = "Internal server error";

/// Categories of errors for classification and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// The merged request failed validation.
    Validation,
    /// Missing or invalid credentials.
    Authentication,
    /// No route matched the request path.
    NotFound,
    /// A route matched the path but not the method.
    MethodNotAllowed,
    /// A rate limit was exceeded.
    RateLimited,
    /// A handler raised an error with an explicit status.
    Business,
    /// The process is misconfigured (e.g. no signature verifier).
    Configuration,
    /// Anything else.
    Internal,
}

/// Standard error type for Covenant handlers and the dispatch pipeline.
///
/// # Example
///
/// ```
/// use covenant_core::CovenantError;
/// use http::StatusCode;
///
/// fn find_user(id: u64) -> Result<(), CovenantError> {
///     Err(CovenantError::http(StatusCode::NOT_FOUND, format!("user {id} not found")))
/// }
///
/// let err = find_user(7).unwrap_err();
/// assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
/// assert_eq!(err.to_envelope().message, "user 7 not found");
/// ```
#[derive(Error, Debug)]
pub enum CovenantError {
    /// Request validation failed.
    #[error("Validation error: {message}")]
    Validation {
        /// Human-readable error message.
        message: String,
        /// Field-specific issues; `None` for a generic failure.
        issues: Option<FieldIssues>,
    },

    /// A handler raised an error with an explicit status.
    #[error("{message}")]
    Http {
        /// Status sent to the caller.
        status: StatusCode,
        /// Message sent to the caller.
        message: String,
        /// Optional structured details.
        details: Option<serde_json::Value>,
    },

    /// Authentication failed.
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Human-readable error message.
        message: String,
    },

    /// No route matched.
    #[error("Not found: {message}")]
    NotFound {
        /// Human-readable error message.
        message: String,
    },

    /// The path matched under other methods.
    #[error("Method not allowed: {message}")]
    MethodNotAllowed {
        /// Human-readable error message.
        message: String,
        /// Methods registered for the path.
        allowed: Vec<Method>,
    },

    /// Rate limit exceeded.
    #[error("Rate limited: {message}")]
    RateLimited {
        /// Human-readable error message.
        message: String,
        /// Seconds until the caller may retry.
        retry_after_seconds: Option<u64>,
    },

    /// The process is missing required configuration.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of what is missing (not exposed to clients).
        message: String,
    },

    /// Internal server error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message (not exposed to clients).
        message: String,
        /// The underlying error (not exposed to clients).
        #[source]
        source: Option<anyhow::Error>,
    },
}

impl CovenantError {
    /// Creates a generic validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            issues: None,
        }
    }

    /// Creates a validation error with per-field issues.
    #[must_use]
    pub fn validation_with_issues(message: impl Into<String>, issues: FieldIssues) -> Self {
        Self::Validation {
            message: message.into(),
            issues: Some(issues),
        }
    }

    /// Creates a business error carrying an explicit status.
    #[must_use]
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: None,
        }
    }

    /// Creates a business error with structured details.
    #[must_use]
    pub fn http_with_details(
        status: StatusCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self::Http {
            status,
            message: message.into(),
            details: Some(details),
        }
    }

    /// Creates an authentication error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Creates a not found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates a method not allowed error.
    #[must_use]
    pub fn method_not_allowed(message: impl Into<String>, allowed: Vec<Method>) -> Self {
        Self::MethodNotAllowed {
            message: message.into(),
            allowed,
        }
    }

    /// Creates a rate limited error.
    #[must_use]
    pub fn rate_limited(message: impl Into<String>, retry_after_seconds: Option<u64>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after_seconds,
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an internal error with a source error.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl Into<anyhow::Error>,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Returns the error category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::Http { .. } => ErrorCategory::Business,
            Self::Unauthorized { .. } => ErrorCategory::Authentication,
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::MethodNotAllowed { .. } => ErrorCategory::MethodNotAllowed,
            Self::RateLimited { .. } => ErrorCategory::RateLimited,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Http { status, .. } => *status,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Configuration { .. } | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Returns `true` if the details of this error must not reach the caller.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self, Self::Configuration { .. } | Self::Internal { .. })
    }

    /// Converts this error to its wire envelope.
    ///
    /// Internal and configuration errors collapse to a generic message.
    #[must_use]
    pub fn to_envelope(&self) -> ErrorEnvelope {
        let message = match self {
            Self::Validation { message, .. }
            | Self::Http { message, .. }
            | Self::Unauthorized { message }
            | Self::NotFound { message }
            | Self::MethodNotAllowed { message, .. }
            | Self::RateLimited { message, .. } => message.clone(),
            Self::Configuration { .. } | Self::Internal { .. } => GENERIC_MESSAGE.to_string(),
        };

        ErrorEnvelope {
            status: self.status_code().as_u16(),
            message,
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation {
                issues: Some(issues),
                ..
            } => serde_json::to_value(issues).ok(),
            Self::Http { details, .. } => details.clone(),
            Self::RateLimited {
                retry_after_seconds: Some(seconds),
                ..
            } => Some(serde_json::json!({ "retry_after_seconds": seconds })),
            _ => None,
        }
    }
}

/// Serializable error envelope for HTTP responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// HTTP status code.
    pub status: u16,
    /// Human-readable error message.
    pub message: String,
    /// Additional error details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_with_issues() {
        let mut issues = FieldIssues::new();
        issues.add("email", "Invalid format");
        issues.add("name", "Too long");

        let error = CovenantError::validation_with_issues("Invalid request", issues);
        assert_eq!(error.category(), ErrorCategory::Validation);
        assert_eq!(error.status_code(), StatusCode::BAD_REQUEST);

        let envelope = error.to_envelope();
        assert_eq!(envelope.status, 400);
        assert_eq!(envelope.message, "Invalid request");
        let details = envelope.details.unwrap();
        assert_eq!(details[0]["path"], "email");
        assert_eq!(details[1]["message"], "Too long");
    }

    #[test]
    fn test_generic_validation_has_no_details() {
        let envelope = CovenantError::validation("missing field `name`").to_envelope();
        assert!(envelope.details.is_none());
    }

    #[test]
    fn test_business_error_is_verbatim() {
        let error = CovenantError::http(StatusCode::CONFLICT, "Email already registered");
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
        assert_eq!(error.category(), ErrorCategory::Business);

        let envelope = error.to_envelope();
        assert_eq!(envelope.status, 409);
        assert_eq!(envelope.message, "Email already registered");
    }

    #[test]
    fn test_internal_error_is_opaque() {
        let error = CovenantError::internal_with_source(
            "store unavailable",
            std::io::Error::new(std::io::ErrorKind::Other, "connection refused"),
        );
        assert!(error.is_opaque());
        assert_eq!(error.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let envelope = error.to_envelope();
        assert_eq!(envelope.message, GENERIC_MESSAGE);
        assert!(!serde_json::to_string(&envelope).unwrap().contains("connection"));
    }

    #[test]
    fn test_configuration_error_is_opaque() {
        let error = CovenantError::configuration("no signature verifier registered");
        assert_eq!(error.to_envelope().message, GENERIC_MESSAGE);
        assert_eq!(error.category(), ErrorCategory::Configuration);
    }

    #[test]
    fn test_rate_limited() {
        let error = CovenantError::rate_limited("Rate limit exceeded", Some(60));
        assert_eq!(error.status_code(), StatusCode::TOO_MANY_REQUESTS);

        let details = error.to_envelope().details.unwrap();
        assert_eq!(details["retry_after_seconds"], 60);
    }

    #[test]
    fn test_envelope_serialization_skips_missing_details() {
        let json = serde_json::to_string(&CovenantError::not_found("no route").to_envelope())
            .unwrap();
        assert_eq!(json, r#"{"status":404,"message":"no route"}"#);
    }

    #[test]
    fn test_all_categories_map_to_error_status() {
        let errors = [
            CovenantError::validation("x"),
            CovenantError::unauthorized("x"),
            CovenantError::not_found("x"),
            CovenantError::method_not_allowed("x", vec![Method::GET]),
            CovenantError::rate_limited("x", None),
            CovenantError::configuration("x"),
            CovenantError::internal("x"),
        ];

        for error in errors {
            let status = error.status_code();
            assert!(
                status.is_client_error() || status.is_server_error(),
                "{:?} should map to an error status, got {}",
                error.category(),
                status
            );
        }
    }
}
