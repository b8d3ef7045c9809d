//! Response envelopes.
//!
//! Handlers return a [`Reply`]: a status, an optional payload, extra headers
//! and cookies. The dispatcher turns it into an HTTP response with
//! [`Reply::into_response`]; errors take the other path through
//! [`error_response`].
//!
//! | Constructor | Status | Body |
//! |-------------|--------|------|
//! | [`Reply::ok`] | 200 | JSON |
//! | [`Reply::created`] | 201 | JSON |
//! | [`Reply::no_content`] | 204 | empty |
//! | [`Reply::with_status`] | any | JSON, empty for 204 |

use crate::SetCookie;
use bytes::Bytes;
use covenant_core::{CovenantError, CovenantResult};
use http::header::{self, HeaderValue, IntoHeaderName};
use http::{HeaderMap, Response, StatusCode};
use serde::Serialize;

const APPLICATION_JSON: &str = "application/json";

/// A handler's successful result.
///
/// # Example
///
/// ```rust
/// use covenant_extract::{Reply, SetCookie};
/// use http::{HeaderValue, StatusCode};
///
/// let reply = Reply::created(serde_json::json!({"id": 7}))
///     .header("location", HeaderValue::from_static("/users/7"))
///     .cookie(SetCookie::new("session", "abc").http_only(true));
///
/// let response = reply.into_response().unwrap();
/// assert_eq!(response.status(), StatusCode::CREATED);
/// assert_eq!(response.headers()["location"], "/users/7");
/// assert_eq!(response.headers()["set-cookie"], "session=abc; HttpOnly");
/// ```
#[derive(Debug, Clone)]
pub struct Reply<T> {
    status: StatusCode,
    data: Option<T>,
    headers: HeaderMap,
    cookies: Vec<SetCookie>,
}

impl<T> Reply<T> {
    /// 200 with a JSON payload.
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self::with_status(StatusCode::OK, data)
    }

    /// 201 with a JSON payload.
    #[must_use]
    pub fn created(data: T) -> Self {
        Self::with_status(StatusCode::CREATED, data)
    }

    /// Any status with a JSON payload.
    ///
    /// A 204 status drops the payload.
    #[must_use]
    pub fn with_status(status: StatusCode, data: T) -> Self {
        Self {
            status,
            data: Some(data),
            headers: HeaderMap::new(),
            cookies: Vec::new(),
        }
    }

    /// 204 with no body.
    #[must_use]
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            data: None,
            headers: HeaderMap::new(),
            cookies: Vec::new(),
        }
    }

    /// Adds a response header.
    #[must_use]
    pub fn header<K: IntoHeaderName>(mut self, name: K, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Adds a cookie.
    #[must_use]
    pub fn cookie(mut self, cookie: SetCookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Returns the status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the payload, if any.
    #[must_use]
    pub const fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns the extra headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the cookies.
    #[must_use]
    pub fn cookies(&self) -> &[SetCookie] {
        &self.cookies
    }
}

impl<T: Serialize> Reply<T> {
    /// Builds the HTTP response.
    ///
    /// Fails if the payload cannot be serialized or a cookie renders to an
    /// invalid header value.
    pub fn into_response(self) -> CovenantResult<Response<Bytes>> {
        let body = match self.data {
            Some(data) if self.status != StatusCode::NO_CONTENT => {
                let bytes = serde_json::to_vec(&data).map_err(|e| {
                    CovenantError::internal_with_source("failed to serialize reply", e)
                })?;
                Some(Bytes::from(bytes))
            }
            _ => None,
        };

        let mut headers = self.headers;
        for cookie in &self.cookies {
            let value = HeaderValue::from_str(&cookie.to_header_value()).map_err(|e| {
                CovenantError::internal_with_source(
                    format!("invalid cookie `{}`", cookie.name()),
                    e,
                )
            })?;
            headers.append(header::SET_COOKIE, value);
        }

        let mut response = match body {
            Some(bytes) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
                Response::new(bytes)
            }
            None => Response::new(Bytes::new()),
        };
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// Renders an error as the standard `{status, message, details?}` envelope.
///
/// Adds `Allow` for 405 and `Retry-After` for 429 when known.
#[must_use]
pub fn error_response(error: &CovenantError) -> Response<Bytes> {
    let envelope = error.to_envelope();
    // An envelope holds only strings, numbers and JSON values.
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    let mut response = Response::new(Bytes::from(body));
    *response.status_mut() = error.status_code();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));

    match error {
        CovenantError::MethodNotAllowed { allowed, .. } => {
            let allow = allowed
                .iter()
                .map(http::Method::as_str)
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                headers.insert(header::ALLOW, value);
            }
        }
        CovenantError::RateLimited {
            retry_after_seconds: Some(seconds),
            ..
        } => {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(*seconds));
        }
        _ => {}
    }

    response
}
