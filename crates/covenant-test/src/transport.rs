//! A [`Transport`] that calls a [`Dispatcher`] directly.

use async_trait::async_trait;
use bytes::Bytes;
use covenant_client::{ClientError, ClientResult, Transport};
use covenant_server::Dispatcher;
use http::{HeaderMap, Method, Request, Response};
use std::sync::{Arc, Mutex, PoisonError};

/// A request as the dispatcher received it.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Request method.
    pub method: Method,
    /// Path plus `?query`, without scheme or authority.
    pub path_and_query: String,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Bytes,
}

impl RecordedRequest {
    /// Returns the query string, if any.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.path_and_query.split_once('?').map(|(_, query)| query)
    }

    /// Returns the path without the query.
    #[must_use]
    pub fn path(&self) -> &str {
        self.path_and_query
            .split_once('?')
            .map_or(self.path_and_query.as_str(), |(path, _)| path)
    }
}

/// Routes client calls into a dispatcher in the same process.
///
/// The scheme and authority of the URL are dropped; the dispatcher sees the
/// path, query, headers and body exactly as a server would.
#[derive(Debug, Clone)]
pub struct InMemoryTransport {
    dispatcher: Arc<Dispatcher>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl InMemoryTransport {
    /// Wraps a shared dispatcher.
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            recorded: Arc::default(),
        }
    }

    /// Returns every request sent so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the most recent request.
    #[must_use]
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }

    /// Returns how many requests were sent.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn send(&self, request: Request<Bytes>) -> ClientResult<Response<Bytes>> {
        let (mut parts, body) = request.into_parts();
        let path_and_query = parts
            .uri
            .path_and_query()
            .map_or_else(|| "/".to_string(), ToString::to_string);

        self.recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                method: parts.method.clone(),
                path_and_query: path_and_query.clone(),
                headers: parts.headers.clone(),
                body: body.clone(),
            });

        // Only the origin-form reaches a real server.
        parts.uri = path_and_query
            .parse()
            .map_err(ClientError::transport)?;

        Ok(self
            .dispatcher
            .dispatch(Request::from_parts(parts, body))
            .await)
    }
}
