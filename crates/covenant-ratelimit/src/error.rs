//! Rate limiter errors.

use covenant_core::CovenantError;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by a [`CounterStore`](crate::CounterStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The Redis command failed.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Any other backend failure.
    #[error("counter store error: {0}")]
    Backend(String),
}

/// Errors raised while enforcing a rule.
#[derive(Debug, Error)]
pub enum RateLimitError {
    /// The rule itself is unusable.
    #[error("invalid rate limit rule: {reason}")]
    InvalidRule {
        /// What is wrong with it.
        reason: String,
    },

    /// The context map lacks a key the rule names.
    #[error("rate limit context for `{action}` is missing `{key}`")]
    MissingContext {
        /// Rule action.
        action: String,
        /// The absent key.
        key: String,
    },

    /// The principal used up its quota for the current window.
    #[error("rate limit exceeded for `{action}` by `{principal}` (limit {limit})")]
    Exceeded {
        /// Rule action.
        action: String,
        /// Joined context values.
        principal: String,
        /// The rule's limit.
        limit: u64,
        /// Time until the window closes.
        retry_after: Duration,
    },

    /// The counter store failed. Never retried.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl RateLimitError {
    /// Creates an [`InvalidRule`](Self::InvalidRule) error.
    #[must_use]
    pub fn invalid_rule(reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            reason: reason.into(),
        }
    }

    /// Returns `true` for [`Exceeded`](Self::Exceeded).
    #[must_use]
    pub const fn is_exceeded(&self) -> bool {
        matches!(self, Self::Exceeded { .. })
    }
}

impl From<RateLimitError> for CovenantError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Exceeded { retry_after, .. } => {
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                Self::rate_limited("Rate limit exceeded", Some(secs.max(1)))
            }
            RateLimitError::Store(source) => {
                Self::internal_with_source("rate limit store failed", source)
            }
            other => Self::internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[test]
    fn test_exceeded_maps_to_429_with_rounded_up_seconds() {
        let err = RateLimitError::Exceeded {
            action: "login".into(),
            principal: "a@b.c".into(),
            limit: 5,
            retry_after: Duration::from_millis(1_500),
        };
        assert!(err.is_exceeded());

        let err = CovenantError::from(err);
        assert_eq!(err.status_code(), StatusCode::TOO_MANY_REQUESTS);
        assert!(matches!(
            err,
            CovenantError::RateLimited {
                retry_after_seconds: Some(2),
                ..
            }
        ));
    }

    #[test]
    fn test_store_error_is_opaque() {
        let err = CovenantError::from(RateLimitError::from(StoreError::Backend("down".into())));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_envelope().message, "Internal server error");
    }
}
