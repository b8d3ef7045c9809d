//! In-process application harness.

use crate::{InMemoryTransport, TestError, TestResponse};
use bytes::Bytes;
use covenant_client::{Client, ClientConfig};
use covenant_server::Dispatcher;
use http::{HeaderName, HeaderValue, Method, Request};
use serde::Serialize;
use std::sync::Arc;

/// Base URL handed to clients built by [`TestApp`]. Never resolved.
pub const TEST_BASE_URL: &str = "http://covenant.test";

/// A dispatcher plus helpers for calling it without a socket.
///
/// # Example
///
/// ```rust
/// use covenant_core::{Contract, Empty};
/// use covenant_extract::Reply;
/// use covenant_server::Dispatcher;
/// use covenant_test::TestApp;
/// use http::StatusCode;
///
/// # tokio_test::block_on(async {
/// let ping = Contract::get("/ping").with_response::<String>();
/// let app = TestApp::new(
///     Dispatcher::new().route(&ping, |_ctx, _req: Empty| async { Ok(Reply::ok("pong".to_string())) }),
/// );
///
/// let response = app.get("/ping").send().await;
/// response.assert_status(StatusCode::OK);
///
/// let client = app.client();
/// assert_eq!(client.invoke(&ping, Empty {}).await.unwrap().as_deref(), Some("pong"));
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TestApp {
    dispatcher: Arc<Dispatcher>,
}

impl TestApp {
    /// Wraps a dispatcher.
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Returns a fresh recording transport bound to this app.
    #[must_use]
    pub fn transport(&self) -> InMemoryTransport {
        InMemoryTransport::new(Arc::clone(&self.dispatcher))
    }

    /// Returns an anonymous client with default settings.
    #[must_use]
    pub fn client(&self) -> Client {
        self.client_with(ClientConfig::new(TEST_BASE_URL)).0
    }

    /// Returns a client for `config` and the transport it records into.
    #[must_use]
    pub fn client_with(&self, config: ClientConfig) -> (Client, InMemoryTransport) {
        let transport = self.transport();
        (Client::with_transport(config, transport.clone()), transport)
    }

    /// Starts a raw request.
    #[must_use]
    pub fn request(&self, method: Method, uri: &str) -> TestRequest {
        TestRequest {
            dispatcher: Arc::clone(&self.dispatcher),
            method,
            uri: uri.to_string(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    /// Starts a raw GET.
    #[must_use]
    pub fn get(&self, uri: &str) -> TestRequest {
        self.request(Method::GET, uri)
    }

    /// Starts a raw POST.
    #[must_use]
    pub fn post(&self, uri: &str) -> TestRequest {
        self.request(Method::POST, uri)
    }

    /// Starts a raw DELETE.
    #[must_use]
    pub fn delete(&self, uri: &str) -> TestRequest {
        self.request(Method::DELETE, uri)
    }
}

/// A raw request under construction.
#[derive(Debug)]
pub struct TestRequest {
    dispatcher: Arc<Dispatcher>,
    method: Method,
    uri: String,
    headers: Vec<(HeaderName, HeaderValue)>,
    body: Bytes,
}

impl TestRequest {
    /// Adds a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// Adds `Authorization: Bearer <token>`.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::RequestBuild`] if the token is not a valid header value.
    pub fn bearer(self, token: &str) -> Result<Self, TestError> {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| TestError::RequestBuild(e.to_string()))?;
        Ok(self.header(http::header::AUTHORIZATION, value))
    }

    /// Sets a raw body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Sets a JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::Json`] if `value` does not serialize.
    pub fn json<T: Serialize>(self, value: &T) -> Result<Self, TestError> {
        let body = serde_json::to_vec(value)?;
        Ok(self
            .header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(body))
    }

    /// Builds the request without sending it.
    ///
    /// # Errors
    ///
    /// Returns [`TestError::RequestBuild`] for an invalid URI.
    pub fn build(self) -> Result<Request<Bytes>, TestError> {
        let mut builder = Request::builder().method(self.method).uri(self.uri);
        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }
        builder
            .body(self.body)
            .map_err(|e| TestError::RequestBuild(e.to_string()))
    }

    /// Dispatches the request.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built. Use [`TestRequest::build`] to
    /// handle that case.
    pub async fn send(self) -> TestResponse {
        let dispatcher = Arc::clone(&self.dispatcher);
        let request = match self.build() {
            Ok(request) => request,
            Err(e) => panic!("invalid test request: {e}"),
        };
        TestResponse::from_response(dispatcher.dispatch(request).await)
    }
}
