//! Caller identity.

use std::fmt;

/// Who made the current call.
///
/// The dispatcher resolves this from the request headers before the handler
/// runs. Bearer tokens are surfaced as-is unless a token verifier is
/// registered, in which case verified tokens become [`Caller::User`].
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Caller {
    /// No credentials were presented.
    #[default]
    Anonymous,
    /// An unverified bearer token.
    Bearer {
        /// The raw access token.
        token: String,
    },
    /// A user whose token was verified.
    User {
        /// Subject (user id) from the verified token.
        subject: String,
    },
    /// Another service, authenticated by a verified signature.
    Service {
        /// Identifier of the calling application.
        app_id: String,
    },
}

impl Caller {
    /// Returns a string identifier suitable for logging.
    ///
    /// Never includes the bearer token itself.
    #[must_use]
    pub fn log_id(&self) -> String {
        match self {
            Self::Anonymous => "anonymous".to_string(),
            Self::Bearer { .. } => "bearer".to_string(),
            Self::User { subject } => format!("user:{subject}"),
            Self::Service { app_id } => format!("service:{app_id}"),
        }
    }

    /// Returns `true` unless the caller is anonymous.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, Self::Anonymous)
    }

    /// Returns the bearer token, if one was presented and not yet verified.
    #[must_use]
    pub fn bearer_token(&self) -> Option<&str> {
        match self {
            Self::Bearer { token } => Some(token),
            _ => None,
        }
    }
}

// Hand-written so tokens never end up in logs.
impl fmt::Debug for Caller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anonymous => write!(f, "Caller::Anonymous"),
            Self::Bearer { .. } => f
                .debug_struct("Caller::Bearer")
                .field("token", &"<redacted>")
                .finish(),
            Self::User { subject } => f
                .debug_struct("Caller::User")
                .field("subject", subject)
                .finish(),
            Self::Service { app_id } => f
                .debug_struct("Caller::Service")
                .field("app_id", app_id)
                .finish(),
        }
    }
}
