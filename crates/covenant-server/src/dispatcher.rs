//! Contract dispatch.
//!
//! A [`Dispatcher`] owns one route per registered contract. For each request
//! it:
//!
//! 1. Finds the route (404 if no path matches, 405 if only other methods do)
//! 2. Authenticates the caller (bearer or signed server-to-server)
//! 3. Merges path, query and body into the contract's request type
//! 4. Runs the handler and renders its [`Reply`]
//!
//! Every failure on the way becomes the `{status, message, details?}` error
//! envelope. Internal errors are logged with their source chain and reach
//! the caller only as a generic message.

use crate::auth::{bearer_token, SignatureVerifier, TokenVerifier};
use bytes::Bytes;
use covenant_config::ServerSettings;
use covenant_core::signing::{
    content_sha256, is_within_tolerance, SigningPayload, APP_HEADER, CONTENT_SHA256_HEADER,
    SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use covenant_core::{
    Caller, Contract, CovenantError, CovenantResult, RequestContext, RequestId, RequestShape,
    ResponseShape,
};
use covenant_extract::{error_response, merge, Reply};
use http::header::{self, HeaderValue};
use http::{HeaderMap, Method, Request, Response};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// Header carrying the request id, read from requests and echoed on responses.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default accepted clock skew for signed calls.
pub const DEFAULT_SIGNATURE_TOLERANCE: Duration = Duration::from_secs(300);

/// Boxed future returned by an erased handler.
pub type BoxedHandlerFuture = Pin<Box<dyn Future<Output = CovenantResult<Response<Bytes>>> + Send>>;

/// A handler with its request and response types erased.
pub type ErasedHandler = Arc<dyn Fn(Invocation) -> BoxedHandlerFuture + Send + Sync>;

/// Everything a handler invocation needs besides the handler itself.
#[derive(Debug)]
pub struct Invocation {
    /// Per-request context, with the authenticated caller.
    pub context: RequestContext,
    /// Request method.
    pub method: Method,
    /// Parameters captured from the path template.
    pub path_params: HashMap<String, String>,
    /// Raw query string.
    pub query: Option<String>,
    /// Raw body.
    pub body: Bytes,
}

struct Route {
    matcher: Contract,
    server_to_server: bool,
    operation: String,
    handler: ErasedHandler,
}

/// Routes requests to contract handlers.
///
/// # Example
///
/// ```rust
/// use covenant_core::{Contract, RequestContext, Validate};
/// use covenant_extract::Reply;
/// use covenant_server::Dispatcher;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct GetUser { id: u64 }
/// impl Validate for GetUser {}
///
/// #[derive(Serialize, Deserialize)]
/// struct User { id: u64, name: String }
///
/// let get_user = Contract::get("/users/:id")
///     .with_request::<GetUser>()
///     .with_response::<User>();
///
/// let dispatcher = Dispatcher::new().route(&get_user, |_ctx: RequestContext, req: GetUser| async move {
///     Ok(Reply::ok(User { id: req.id, name: "Ada".into() }))
/// });
/// assert_eq!(dispatcher.len(), 1);
/// ```
pub struct Dispatcher {
    routes: Vec<Route>,
    token_verifier: Option<Arc<dyn TokenVerifier>>,
    signature_verifier: Option<Arc<dyn SignatureVerifier>>,
    signature_tolerance: Duration,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("operations", &self.operations().collect::<Vec<_>>())
            .field("has_token_verifier", &self.token_verifier.is_some())
            .field("has_signature_verifier", &self.signature_verifier.is_some())
            .field("signature_tolerance", &self.signature_tolerance)
            .finish()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: Vec::new(),
            token_verifier: None,
            signature_verifier: None,
            signature_tolerance: DEFAULT_SIGNATURE_TOLERANCE,
        }
    }

    /// Creates a dispatcher using the signature tolerance from `settings`.
    #[must_use]
    pub fn from_settings(settings: &ServerSettings) -> Self {
        Self::new().with_signature_tolerance(Duration::from_secs(settings.signature_tolerance_secs))
    }

    /// Installs a bearer token verifier.
    #[must_use]
    pub fn with_token_verifier(mut self, verifier: impl TokenVerifier + 'static) -> Self {
        self.token_verifier = Some(Arc::new(verifier));
        self
    }

    /// Installs the signature verifier required by server-to-server contracts.
    #[must_use]
    pub fn with_signature_verifier(mut self, verifier: impl SignatureVerifier + 'static) -> Self {
        self.signature_verifier = Some(Arc::new(verifier));
        self
    }

    /// Sets the accepted clock skew for signed calls.
    #[must_use]
    pub const fn with_signature_tolerance(mut self, tolerance: Duration) -> Self {
        self.signature_tolerance = tolerance;
        self
    }

    /// Registers `handler` for `contract`, builder style.
    #[must_use]
    pub fn route<Req, Res, F, Fut>(mut self, contract: &Contract<Req, Res>, handler: F) -> Self
    where
        Req: RequestShape,
        Res: ResponseShape,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CovenantResult<Reply<Res>>> + Send + 'static,
    {
        self.register(contract, handler);
        self
    }

    /// Registers `handler` for `contract`.
    ///
    /// Routes are tried in registration order.
    pub fn register<Req, Res, F, Fut>(&mut self, contract: &Contract<Req, Res>, handler: F)
    where
        Req: RequestShape,
        Res: ResponseShape,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CovenantResult<Reply<Res>>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let erased: ErasedHandler = Arc::new(move |invocation: Invocation| {
            let handler = Arc::clone(&handler);
            Box::pin(async move {
                let request: Req = merge(
                    &invocation.method,
                    &invocation.path_params,
                    invocation.query.as_deref(),
                    &invocation.body,
                )?;
                handler(invocation.context, request).await?.into_response()
            })
        });

        tracing::debug!(
            operation = %contract.operation(),
            method = %contract.method(),
            path = contract.path(),
            "registered route"
        );

        self.routes.push(Route {
            matcher: Contract::new(contract.method().clone(), contract.path()),
            server_to_server: contract.is_server_to_server(),
            operation: contract.operation(),
            handler: erased,
        });
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns the operation names, in registration order.
    pub fn operations(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|route| route.operation.as_str())
    }

    /// Handles one request. Never fails; errors become error envelopes.
    pub async fn dispatch(&self, request: Request<Bytes>) -> Response<Bytes> {
        let (parts, body) = request.into_parts();
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(RequestId::parse)
            .unwrap_or_default();

        let mut response = match self.find_route(&parts.method, parts.uri.path()) {
            Ok((route, path_params)) => {
                let operation = route.operation.clone();
                match self
                    .invoke(route, request_id, parts, path_params, body)
                    .await
                {
                    Ok(response) => response,
                    Err(error) => render_error(&operation, request_id, &error),
                }
            }
            Err(error) => render_error("", request_id, &error),
        };

        if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }

    fn find_route(
        &self,
        method: &Method,
        path: &str,
    ) -> CovenantResult<(&Route, HashMap<String, String>)> {
        let mut allowed = Vec::new();
        for route in &self.routes {
            if let Some(params) = route.matcher.match_path(path) {
                if route.matcher.method() == method {
                    return Ok((route, params));
                }
                if !allowed.contains(route.matcher.method()) {
                    allowed.push(route.matcher.method().clone());
                }
            }
        }

        if allowed.is_empty() {
            Err(CovenantError::not_found(format!("No route for {path}")))
        } else {
            Err(CovenantError::method_not_allowed(
                format!("Method {method} not allowed for {path}"),
                allowed,
            ))
        }
    }

    async fn invoke(
        &self,
        route: &Route,
        request_id: RequestId,
        parts: http::request::Parts,
        path_params: HashMap<String, String>,
        body: Bytes,
    ) -> CovenantResult<Response<Bytes>> {
        let caller = if route.server_to_server {
            self.verify_signature(&route.operation, &parts, &body).await?
        } else {
            self.bearer_caller(&route.operation, &parts.headers).await?
        };

        let context = RequestContext::new(route.operation.clone())
            .with_request_id(request_id)
            .with_caller(caller)
            .with_headers(parts.headers);

        tracing::debug!(
            request_id = %request_id,
            operation = %route.operation,
            caller = %context.caller().log_id(),
            http.method = %parts.method,
            http.path = parts.uri.path(),
            "dispatching"
        );

        let invocation = Invocation {
            context,
            method: parts.method,
            path_params,
            query: parts.uri.query().map(ToString::to_string),
            body,
        };
        let response = (route.handler)(invocation).await?;

        tracing::debug!(
            request_id = %request_id,
            operation = %route.operation,
            http.status_code = response.status().as_u16(),
            "dispatched"
        );
        Ok(response)
    }

    async fn bearer_caller(&self, operation: &str, headers: &HeaderMap) -> CovenantResult<Caller> {
        let Some(token) = headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(bearer_token)
        else {
            return Ok(Caller::Anonymous);
        };

        match &self.token_verifier {
            None => Ok(Caller::Bearer {
                token: token.to_string(),
            }),
            Some(verifier) => match verifier.verify(token).await {
                Ok(subject) => Ok(Caller::User { subject }),
                Err(error) => {
                    tracing::warn!(operation, error = %error, "bearer token rejected");
                    Err(error)
                }
            },
        }
    }

    async fn verify_signature(
        &self,
        operation: &str,
        parts: &http::request::Parts,
        body: &Bytes,
    ) -> CovenantResult<Caller> {
        let Some(verifier) = &self.signature_verifier else {
            return Err(CovenantError::configuration(format!(
                "`{operation}` is server-to-server but no signature verifier is installed"
            )));
        };

        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());
        let (Some(timestamp), Some(app_id), Some(signature)) = (
            header(TIMESTAMP_HEADER),
            header(APP_HEADER),
            header(SIGNATURE_HEADER),
        ) else {
            tracing::warn!(operation, "signed call missing signature headers");
            return Err(CovenantError::unauthorized("Missing signature"));
        };

        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| CovenantError::unauthorized("Invalid signature timestamp"))?;
        let tolerance_ms = i64::try_from(self.signature_tolerance.as_millis()).unwrap_or(i64::MAX);
        let now_ms = chrono::Utc::now().timestamp_millis();
        if !is_within_tolerance(timestamp, now_ms, tolerance_ms) {
            tracing::warn!(operation, app_id, timestamp, now_ms, "stale signature");
            return Err(CovenantError::unauthorized("Signature expired"));
        }

        if let Some(expected) = header(CONTENT_SHA256_HEADER) {
            if !expected.eq_ignore_ascii_case(&content_sha256(body)) {
                tracing::warn!(operation, app_id, "content hash mismatch");
                return Err(CovenantError::unauthorized("Invalid signature"));
            }
        }

        let path = parts
            .uri
            .path_and_query()
            .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
        let payload = SigningPayload {
            app_id: app_id.to_string(),
            path,
            timestamp,
            body: covenant_core::contract::method_has_body(&parts.method)
                .then(|| serde_json::from_slice(body).ok())
                .flatten(),
        };

        if verifier.verify(app_id, &payload.digest(), signature).await {
            Ok(Caller::Service {
                app_id: app_id.to_string(),
            })
        } else {
            tracing::warn!(operation, app_id, "signature verification failed");
            Err(CovenantError::unauthorized("Invalid signature"))
        }
    }
}

fn render_error(operation: &str, request_id: RequestId, error: &CovenantError) -> Response<Bytes> {
    if error.is_opaque() {
        let chain = error_chain(error);
        tracing::error!(
            request_id = %request_id,
            operation,
            error = %chain,
            "request failed"
        );
    } else {
        tracing::debug!(
            request_id = %request_id,
            operation,
            http.status_code = error.status_code().as_u16(),
            error = %error,
            "request rejected"
        );
    }
    error_response(error)
}

fn error_chain(error: &CovenantError) -> String {
    let mut rendered = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ed25519Verifier;
    use async_trait::async_trait;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use covenant_core::{FieldIssues, Validate};
    use covenant_extract::SetCookie;
    use ed25519_dalek::{Signer, SigningKey};
    use http::StatusCode;
    use serde::{Deserialize, Serialize};
    use serde_json::{json, Value};

    #[derive(Debug, Serialize, Deserialize)]
    struct GetUser {
        id: u64,
    }
    impl Validate for GetUser {}

    #[derive(Debug, Serialize, Deserialize)]
    struct CreateUser {
        name: String,
        #[serde(default)]
        email: String,
    }
    impl Validate for CreateUser {
        fn validate(&self) -> Result<(), FieldIssues> {
            let mut issues = FieldIssues::new();
            if !self.email.contains('@') {
                issues.add("email", "must be an email address");
            }
            issues.into_result()
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct User {
        id: u64,
        name: String,
    }

    fn request(method: Method, uri: &str, body: &str) -> Request<Bytes> {
        let mut request = Request::new(Bytes::copy_from_slice(body.as_bytes()));
        *request.method_mut() = method;
        *request.uri_mut() = uri.parse().unwrap();
        request
    }

    fn json_body(response: &Response<Bytes>) -> Value {
        serde_json::from_slice(response.body()).unwrap()
    }

    fn users() -> Dispatcher {
        let get_user = Contract::get("/users/:id")
            .with_request::<GetUser>()
            .with_response::<User>();
        let create_user = Contract::post("/users")
            .with_request::<CreateUser>()
            .with_response::<User>();
        let whoami = Contract::get("/whoami").with_response::<Value>();

        Dispatcher::new()
            .route(&get_user, |_ctx, req: GetUser| async move {
                if req.id == 0 {
                    return Err(CovenantError::http(StatusCode::CONFLICT, "user zero is reserved"));
                }
                Ok(Reply::ok(User {
                    id: req.id,
                    name: "Ada".into(),
                }))
            })
            .route(&create_user, |_ctx, req: CreateUser| async move {
                Ok(Reply::created(User { id: 1, name: req.name })
                    .cookie(SetCookie::new("session", "s1").http_only(true)))
            })
            .route(&whoami, |ctx: RequestContext, _req| async move {
                Ok(Reply::ok(json!({ "caller": ctx.caller().log_id() })))
            })
    }

    #[tokio::test]
    async fn test_get_coerces_path_param() {
        let response = users()
            .dispatch(request(Method::GET, "/users/7", ""))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(&response), json!({"id": 7, "name": "Ada"}));
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_post_validation_issues() {
        let response = users()
            .dispatch(request(Method::POST, "/users", r#"{"name":"Ada","email":"nope"}"#))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(&response);
        assert_eq!(body["status"], 400);
        assert_eq!(body["details"][0]["path"], "email");
    }

    #[tokio::test]
    async fn test_created_with_cookie() {
        let response = users()
            .dispatch(request(
                Method::POST,
                "/users",
                r#"{"name":"Ada","email":"ada@example.com"}"#,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(response.headers()[header::SET_COOKIE], "session=s1; HttpOnly");
    }

    #[tokio::test]
    async fn test_handler_http_error_passes_through() {
        let response = users()
            .dispatch(request(Method::GET, "/users/0", ""))
            .await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(json_body(&response)["message"], "user zero is reserved");
    }

    #[tokio::test]
    async fn test_not_found_and_method_not_allowed() {
        let dispatcher = users();

        let response = dispatcher.dispatch(request(Method::GET, "/nope", "")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = dispatcher
            .dispatch(request(Method::DELETE, "/users/7", ""))
            .await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[header::ALLOW], "GET");
    }

    #[tokio::test]
    async fn test_bearer_caller_without_verifier() {
        let mut req = request(Method::GET, "/whoami", "");
        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t1"));

        let response = users().dispatch(req).await;
        assert_eq!(json_body(&response)["caller"], "bearer");

        let response = users()
            .dispatch(request(Method::GET, "/whoami", ""))
            .await;
        assert_eq!(json_body(&response)["caller"], "anonymous");
    }

    struct OnlyAlice;

    #[async_trait]
    impl TokenVerifier for OnlyAlice {
        async fn verify(&self, token: &str) -> CovenantResult<String> {
            if token == "alice-token" {
                Ok("alice".into())
            } else {
                Err(CovenantError::unauthorized("Invalid token"))
            }
        }
    }

    #[tokio::test]
    async fn test_token_verifier() {
        let dispatcher = users().with_token_verifier(OnlyAlice);

        let mut req = request(Method::GET, "/whoami", "");
        req.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer alice-token"),
        );
        let response = dispatcher.dispatch(req).await;
        assert_eq!(json_body(&response)["caller"], "user:alice");

        let mut req = request(Method::GET, "/whoami", "");
        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer bad"));
        let response = dispatcher.dispatch(req).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    fn signed_dispatcher(key: &SigningKey) -> Dispatcher {
        let contract = Contract::post("/internal/echo").s2s();
        Dispatcher::new()
            .with_signature_verifier(Ed25519Verifier::new().with_key("billing", key.verifying_key()))
            .route(&contract, |ctx: RequestContext, _req| async move {
                Ok(Reply::ok(covenant_core::Untyped(json!({ "caller": ctx.caller().log_id() }))))
            })
    }

    fn signed_request(key: &SigningKey, body: &str, timestamp: i64) -> Request<Bytes> {
        let payload = SigningPayload {
            app_id: "billing".into(),
            path: "/internal/echo".into(),
            timestamp,
            body: serde_json::from_str(body).ok(),
        };
        let signature = STANDARD.encode(key.sign(&payload.digest()).to_bytes());

        let mut req = request(Method::POST, "/internal/echo", body);
        let headers = req.headers_mut();
        headers.insert(TIMESTAMP_HEADER, HeaderValue::from(timestamp));
        headers.insert(APP_HEADER, HeaderValue::from_static("billing"));
        headers.insert(SIGNATURE_HEADER, HeaderValue::from_str(&signature).unwrap());
        req
    }

    #[tokio::test]
    async fn test_signed_call_accepted() {
        let key = SigningKey::from_bytes(&[8u8; 32]);
        let now = chrono::Utc::now().timestamp_millis();

        let response = signed_dispatcher(&key)
            .dispatch(signed_request(&key, r#"{"n":1}"#, now))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(&response)["caller"], "service:billing");
    }

    #[tokio::test]
    async fn test_signed_call_rejections() {
        let key = SigningKey::from_bytes(&[8u8; 32]);
        let dispatcher = signed_dispatcher(&key);
        let now = chrono::Utc::now().timestamp_millis();

        let stale = signed_request(&key, "{}", now - 10 * 60 * 1000);
        assert_eq!(dispatcher.dispatch(stale).await.status(), StatusCode::UNAUTHORIZED);

        let mut tampered = signed_request(&key, r#"{"n":1}"#, now);
        *tampered.body_mut() = Bytes::from_static(br#"{"n":2}"#);
        assert_eq!(dispatcher.dispatch(tampered).await.status(), StatusCode::UNAUTHORIZED);

        let unsigned = request(Method::POST, "/internal/echo", "{}");
        assert_eq!(dispatcher.dispatch(unsigned).await.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_signed_route_without_verifier_is_internal_error() {
        let contract = Contract::get("/internal/ping").s2s();
        let dispatcher = Dispatcher::new().route(&contract, |_ctx, _req| async move {
            Ok(Reply::ok(covenant_core::Untyped(json!({}))))
        });

        let response = dispatcher
            .dispatch(request(Method::GET, "/internal/ping", ""))
            .await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(&response)["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let id = RequestId::new();
        let mut req = request(Method::GET, "/users/1", "");
        req.headers_mut()
            .insert(REQUEST_ID_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());

        let response = users().dispatch(req).await;
        assert_eq!(response.headers()[REQUEST_ID_HEADER], id.to_string().as_str());
    }

    #[test]
    fn test_operations_listed_in_order() {
        let ops: Vec<_> = users().operations().map(ToString::to_string).collect();
        assert_eq!(ops, ["GET /users/:id", "POST /users", "GET /whoami"]);
    }
}
