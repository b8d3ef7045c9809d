//! The client invoker.

use crate::auth::{RequestSigner, TokenProvider};
use crate::request::render;
use crate::transport::{ReqwestTransport, Transport};
use crate::{ClientError, ClientResult};
use async_trait::async_trait;
use bytes::Bytes;
use covenant_config::ClientSettings;
use covenant_core::signing::{
    content_sha256, SigningPayload, APP_HEADER, CONTENT_SHA256_HEADER, SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};
use covenant_core::{Contract, RequestShape, ResponseShape};
use http::header::{self, HeaderMap, HeaderName, HeaderValue};
use http::{Request, Response, StatusCode};
use reqwest::Url;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

const UNKNOWN_ERROR: &str = "Unknown error";
const APPLICATION_JSON: &str = "application/json";

/// Settings shared by every call a [`Client`] makes.
#[derive(Clone)]
pub struct ClientConfig {
    base_url: String,
    app_id: Option<String>,
    token_provider: Option<Arc<dyn TokenProvider>>,
    signer: Option<Arc<dyn RequestSigner>>,
    default_headers: HeaderMap,
    timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for `base_url` with no credentials.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: None,
            token_provider: None,
            signer: None,
            default_headers: HeaderMap::new(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Builds a configuration from the `client` settings section.
    #[must_use]
    pub fn from_settings(settings: &ClientSettings) -> Self {
        let mut config =
            Self::new(&settings.base_url).with_timeout(Duration::from_millis(settings.timeout_ms));
        config.app_id.clone_from(&settings.app_id);
        config
    }

    /// Sets the application id sent on signed calls.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = Some(app_id.into());
        self
    }

    /// Sets the bearer token source.
    #[must_use]
    pub fn with_token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the signer used for server-to-server contracts.
    #[must_use]
    pub fn with_signer(mut self, signer: impl RequestSigner + 'static) -> Self {
        self.signer = Some(Arc::new(signer));
        self
    }

    /// Adds a header sent on every call.
    #[must_use]
    pub fn with_default_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    /// Sets the transport timeout used by [`Client::new`].
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns the base URL, without a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the application id, if set.
    #[must_use]
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("app_id", &self.app_id)
            .field("has_token_provider", &self.token_provider.is_some())
            .field("has_signer", &self.signer.is_some())
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    anonymous: bool,
    headers: HeaderMap,
}

impl InvokeOptions {
    /// Default options: bearer auth if a token is available.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Options that skip bearer auth for this call.
    #[must_use]
    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    /// Adds a header for this call only. Overrides a default header of the same name.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Invokes contracts against one server.
///
/// # Example
///
/// ```no_run
/// use covenant_client::{Client, ClientConfig, StaticToken};
/// use covenant_core::{Contract, Validate};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct GetUser { id: u64 }
/// impl Validate for GetUser {}
///
/// #[derive(Serialize, Deserialize)]
/// struct User { id: u64, name: String }
///
/// # async fn run() -> Result<(), covenant_client::ClientError> {
/// let client = Client::new(
///     ClientConfig::new("https://api.example.com").with_token_provider(StaticToken::new("t")),
/// )?;
/// let get_user = Contract::get("/users/:id")
///     .with_request::<GetUser>()
///     .with_response::<User>();
///
/// let user = client.invoke(&get_user, GetUser { id: 7 }).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Creates a client using the `reqwest` transport.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Configuration`] if the transport cannot be built.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let transport = ReqwestTransport::new(config.timeout)?;
        Ok(Self::with_transport(config, transport))
    }

    /// Creates a client over a custom transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            config: Arc::new(config),
            transport: Arc::new(transport),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Invokes `contract` with default options.
    ///
    /// Returns `Ok(None)` for a 204 or an empty success body.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn invoke<Req, Res>(
        &self,
        contract: &Contract<Req, Res>,
        request: Req,
    ) -> ClientResult<Option<Res>>
    where
        Req: RequestShape,
        Res: ResponseShape,
    {
        self.invoke_with(contract, request, InvokeOptions::default())
            .await
    }

    /// Invokes `contract` with explicit options.
    ///
    /// # Errors
    ///
    /// See [`ClientError`].
    pub async fn invoke_with<Req, Res>(
        &self,
        contract: &Contract<Req, Res>,
        request: Req,
        options: InvokeOptions,
    ) -> ClientResult<Option<Res>>
    where
        Req: RequestShape,
        Res: ResponseShape,
    {
        let operation = contract.operation();

        // Resolve signing credentials before any work so a misconfigured
        // client never reaches the transport.
        let signing = if contract.is_server_to_server() {
            let signer = self.config.signer.clone().ok_or_else(|| {
                ClientError::configuration(format!(
                    "`{operation}` is server-to-server but no signer is configured"
                ))
            })?;
            let app_id = self.config.app_id.clone().ok_or_else(|| {
                ClientError::configuration(format!(
                    "`{operation}` is server-to-server but no app id is configured"
                ))
            })?;
            Some((signer, app_id))
        } else {
            None
        };

        let rendered = render(contract, &request)?;
        let url = Url::parse(&format!("{}{}", self.config.base_url, rendered.path_and_query))
            .map_err(|e| ClientError::configuration(format!("invalid request url: {e}")))?;

        let mut headers = self.config.default_headers.clone();
        headers.extend(options.headers);
        headers.insert(header::ACCEPT, HeaderValue::from_static(APPLICATION_JSON));

        let body = match &rendered.body {
            Some(value) => {
                let bytes =
                    serde_json::to_vec(value).map_err(|e| ClientError::Encode(e.to_string()))?;
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static(APPLICATION_JSON),
                );
                headers.insert(CONTENT_SHA256_HEADER, header_value(&content_sha256(&bytes))?);
                Bytes::from(bytes)
            }
            None => Bytes::new(),
        };

        if let Some((signer, app_id)) = signing {
            let path = match url.query() {
                Some(query) => format!("{}?{query}", url.path()),
                None => url.path().to_string(),
            };
            let payload = SigningPayload {
                app_id,
                path,
                timestamp: chrono::Utc::now().timestamp_millis(),
                body: rendered.body,
            };
            let signature = signer.sign(&payload.digest()).await?;

            headers.insert(TIMESTAMP_HEADER, header_value(&payload.timestamp.to_string())?);
            headers.insert(APP_HEADER, header_value(&payload.app_id)?);
            headers.insert(SIGNATURE_HEADER, header_value(&signature)?);
        } else if !options.anonymous {
            if let Some(provider) = &self.config.token_provider {
                if let Some(token) = provider.token().await {
                    headers.insert(header::AUTHORIZATION, header_value(&format!("Bearer {token}"))?);
                }
            }
        }

        let mut http_request = Request::new(body);
        *http_request.method_mut() = contract.method().clone();
        *http_request.uri_mut() = url
            .as_str()
            .parse()
            .map_err(|e| ClientError::configuration(format!("invalid request url: {e}")))?;
        *http_request.headers_mut() = headers;

        tracing::debug!(
            operation = %operation,
            method = %contract.method(),
            url = %url,
            "invoking contract"
        );

        let response = self.transport.send(http_request).await?;
        decode_response(&operation, response)
    }
}

fn header_value(value: &str) -> ClientResult<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ClientError::Encode(format!("invalid header value: {e}")))
}

fn decode_response<Res: ResponseShape>(
    operation: &str,
    response: Response<Bytes>,
) -> ClientResult<Option<Res>> {
    let status = response.status();
    let body = response.into_body();

    if !status.is_success() {
        let error = error_from_body(status, &body);
        tracing::debug!(operation, status = %status, error = %error, "contract call failed");
        return Err(error);
    }

    if status == StatusCode::NO_CONTENT || body.is_empty() {
        return Ok(None);
    }

    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|e| ClientError::Decode {
            status,
            message: e.to_string(),
        })
}

/// Reads the `{status, message, details?}` envelope, tolerating anything.
fn error_from_body(status: StatusCode, body: &[u8]) -> ClientError {
    let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);

    let envelope_status = value
        .get("status")
        .and_then(Value::as_u64)
        .and_then(|code| u16::try_from(code).ok())
        .and_then(|code| StatusCode::from_u16(code).ok());
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_ERROR)
        .to_string();
    let details = value.get("details").filter(|d| !d.is_null()).cloned();

    let status = envelope_status
        .or_else(|| (status.is_client_error() || status.is_server_error()).then_some(status))
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    ClientError::Http {
        status,
        message,
        details,
    }
}

/// Invokes a contract directly: `contract.invoke(&client, request)`.
#[async_trait]
pub trait Invoke<Req, Res> {
    /// Invokes with default options.
    async fn invoke(&self, client: &Client, request: Req) -> ClientResult<Option<Res>>;

    /// Invokes with explicit options.
    async fn invoke_with(
        &self,
        client: &Client,
        request: Req,
        options: InvokeOptions,
    ) -> ClientResult<Option<Res>>;
}

#[async_trait]
impl<Req, Res> Invoke<Req, Res> for Contract<Req, Res>
where
    Req: RequestShape,
    Res: ResponseShape,
{
    async fn invoke(&self, client: &Client, request: Req) -> ClientResult<Option<Res>> {
        client.invoke(self, request).await
    }

    async fn invoke_with(
        &self,
        client: &Client,
        request: Req,
        options: InvokeOptions,
    ) -> ClientResult<Option<Res>> {
        client.invoke_with(self, request, options).await
    }
}
