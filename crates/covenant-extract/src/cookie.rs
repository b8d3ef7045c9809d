//! Cookie support.
//!
//! [`SetCookie`] renders `Set-Cookie` header values for [`Reply`](crate::Reply).
//!
//! # Example
//!
//! ```rust
//! use covenant_extract::{SameSite, SetCookie};
//!
//! let cookie = SetCookie::new("session", "abc123")
//!     .max_age_secs(3600)
//!     .path("/")
//!     .secure(true)
//!     .http_only(true)
//!     .same_site(SameSite::Lax);
//!
//! assert_eq!(
//!     cookie.to_header_value(),
//!     "session=abc123; Max-Age=3600; Path=/; Secure; HttpOnly; SameSite=Lax"
//! );
//! ```

use std::fmt;
use std::time::Duration;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SameSite {
    /// Sent with cross-site requests.
    None,
    /// Sent with same-site requests and cross-site top-level navigations.
    #[default]
    Lax,
    /// Sent with same-site requests only.
    Strict,
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Lax => write!(f, "Lax"),
            Self::Strict => write!(f, "Strict"),
        }
    }
}

/// A cookie to set on the response.
///
/// Attributes render in a fixed order: `Max-Age`, `Path`, `Domain`, `Secure`,
/// `HttpOnly`, `SameSite`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: Option<Duration>,
    path: Option<String>,
    domain: Option<String>,
    secure: bool,
    http_only: bool,
    same_site: Option<SameSite>,
}

impl SetCookie {
    /// Creates a session cookie with no attributes.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: None,
            path: None,
            domain: None,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }

    /// Creates a cookie that clears `name` on the client (`Max-Age=0`).
    #[must_use]
    pub fn remove(name: impl Into<String>) -> Self {
        Self::new(name, "").max_age_secs(0)
    }

    /// Sets `Max-Age`.
    #[must_use]
    pub fn max_age(mut self, duration: Duration) -> Self {
        self.max_age = Some(duration);
        self
    }

    /// Sets `Max-Age` in seconds.
    #[must_use]
    pub fn max_age_secs(self, seconds: u64) -> Self {
        self.max_age(Duration::from_secs(seconds))
    }

    /// Sets `Path`.
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets `Domain`.
    #[must_use]
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Sets `Secure`.
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// Sets `HttpOnly`.
    #[must_use]
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Sets `SameSite`.
    #[must_use]
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }

    /// Returns the cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut parts = vec![format!("{}={}", self.name, self.value)];

        if let Some(max_age) = self.max_age {
            parts.push(format!("Max-Age={}", max_age.as_secs()));
        }
        if let Some(ref path) = self.path {
            parts.push(format!("Path={path}"));
        }
        if let Some(ref domain) = self.domain {
            parts.push(format!("Domain={domain}"));
        }
        if self.secure {
            parts.push("Secure".to_string());
        }
        if self.http_only {
            parts.push("HttpOnly".to_string());
        }
        if let Some(same_site) = self.same_site {
            parts.push(format!("SameSite={same_site}"));
        }

        parts.join("; ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_cookie_simple() {
        assert_eq!(SetCookie::new("session", "abc123").to_header_value(), "session=abc123");
    }

    #[test]
    fn test_set_cookie_attribute_order() {
        // Set in reverse so the output order cannot come from call order.
        let cookie = SetCookie::new("session", "abc123")
            .same_site(SameSite::Strict)
            .http_only(true)
            .secure(true)
            .domain("example.com")
            .path("/app")
            .max_age_secs(3600);

        assert_eq!(
            cookie.to_header_value(),
            "session=abc123; Max-Age=3600; Path=/app; Domain=example.com; Secure; HttpOnly; SameSite=Strict"
        );
    }

    #[test]
    fn test_set_cookie_remove() {
        assert_eq!(SetCookie::remove("session").to_header_value(), "session=; Max-Age=0");
    }

    #[test]
    fn test_same_site_display() {
        assert_eq!(SameSite::None.to_string(), "None");
        assert_eq!(SameSite::Lax.to_string(), "Lax");
        assert_eq!(SameSite::Strict.to_string(), "Strict");
    }
}
