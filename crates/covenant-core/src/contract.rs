//! Contract declarations.
//!
//! A [`Contract`] is the single source of truth for one RPC: HTTP method, path
//! template, request shape, response shape and authentication mode. Both the
//! client invoker and the server dispatcher are driven by the same value, so
//! the two sides cannot disagree about where fields travel.
//!
//! Contracts are built in stages. Each stage takes `&self` and returns a new
//! value, so a partially built contract can be shared and extended without
//! affecting other users of it. The request shape must be declared before the
//! response shape; the type parameters make the other order unrepresentable.
//!
//! # Example
//!
//! ```
//! use covenant_core::{Contract, Validate};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! impl Validate for CreateUser {}
//!
//! #[derive(Serialize, Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! let create_user = Contract::post("/users")
//!     .with_request::<CreateUser>()
//!     .with_response::<User>();
//!
//! let delete_user = Contract::delete("/users/:id");
//!
//! assert_eq!(create_user.path(), "/users");
//! assert_eq!(delete_user.path_params().collect::<Vec<_>>(), vec!["id"]);
//! ```

use crate::Validate;
use http::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Bounds a type must satisfy to be used as a contract's request shape.
pub trait RequestShape: Serialize + DeserializeOwned + Validate + Send + 'static {}

impl<T> RequestShape for T where T: Serialize + DeserializeOwned + Validate + Send + 'static {}

/// Bounds a type must satisfy to be used as a contract's response shape.
pub trait ResponseShape: Serialize + DeserializeOwned + Send + 'static {}

impl<T> ResponseShape for T where T: Serialize + DeserializeOwned + Send + 'static {}

/// The request shape of a contract that declares no fields.
///
/// Serializes to `{}` and accepts any object, ignoring its fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

impl Validate for Empty {}

/// The response shape of a contract that has not declared one.
///
/// Wraps whatever JSON the server sends back.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Untyped(pub serde_json::Value);

/// One segment of a contract path template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// A literal segment that must match exactly.
    Literal(String),
    /// A `:name` segment bound to a request field.
    Param(String),
}

/// An immutable RPC declaration.
///
/// `Req` and `Res` default to [`Empty`] and [`Untyped`]; they are replaced by
/// [`Contract::with_request`] and [`Contract::with_response`].
pub struct Contract<Req = Empty, Res = Untyped> {
    method: Method,
    path: Arc<str>,
    segments: Arc<[PathSegment]>,
    operation: Option<Arc<str>>,
    server_to_server: bool,
    _shape: PhantomData<fn() -> (Req, Res)>,
}

impl Contract {
    /// Creates a bare contract for `method` and `path`.
    ///
    /// A bare contract is already invocable with an empty request.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path: String = path.into();
        let segments = parse_path(&path);
        Self {
            method,
            path: path.into(),
            segments: segments.into(),
            operation: None,
            server_to_server: false,
            _shape: PhantomData,
        }
    }

    /// Creates a `GET` contract.
    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    /// Creates a `POST` contract.
    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    /// Creates a `PUT` contract.
    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    /// Creates a `PATCH` contract.
    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    /// Creates a `DELETE` contract.
    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Declares the request shape.
    ///
    /// Only available before a response shape has been declared.
    #[must_use]
    pub fn with_request<Req: RequestShape>(&self) -> Contract<Req, Untyped> {
        self.restage()
    }
}

impl<Req> Contract<Req, Untyped> {
    /// Declares the response shape.
    #[must_use]
    pub fn with_response<Res: ResponseShape>(&self) -> Contract<Req, Res> {
        self.restage()
    }
}

impl<Req, Res> Contract<Req, Res> {
    /// Marks the contract as server-to-server.
    ///
    /// Server-to-server calls are signed instead of carrying a bearer token.
    #[must_use]
    pub fn s2s(&self) -> Self {
        let mut next = self.clone();
        next.server_to_server = true;
        next
    }

    /// Attaches an operation name used in logs.
    #[must_use]
    pub fn named(&self, operation: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.operation = Some(Arc::from(operation.into()));
        next
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the path template (e.g. `/users/:id`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the parsed path template.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Returns the names of the `:name` segments, in order.
    pub fn path_params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|segment| match segment {
            PathSegment::Param(name) => Some(name.as_str()),
            PathSegment::Literal(_) => None,
        })
    }

    /// Returns the operation name, defaulting to `"<METHOD> <path>"`.
    #[must_use]
    pub fn operation(&self) -> String {
        self.operation
            .as_deref()
            .map_or_else(|| format!("{} {}", self.method, self.path), ToString::to_string)
    }

    /// Returns whether calls are signed server-to-server instead of using bearer tokens.
    #[must_use]
    pub fn is_server_to_server(&self) -> bool {
        self.server_to_server
    }

    /// Returns whether requests for this contract carry a body.
    ///
    /// `GET`, `DELETE`, `HEAD` and `OPTIONS` send their fields in the query
    /// string; everything else sends a JSON body.
    #[must_use]
    pub fn has_body(&self) -> bool {
        method_has_body(&self.method)
    }

    /// Matches a concrete request path against the template.
    ///
    /// Returns the extracted path parameters if the path matches. Empty
    /// segments (leading, trailing or doubled slashes) are ignored.
    #[must_use]
    pub fn match_path(&self, request_path: &str) -> Option<HashMap<String, String>> {
        let mut actual = request_path.split('/').filter(|s| !s.is_empty());
        let mut params = HashMap::new();

        for pattern in self.segments.iter() {
            let segment = actual.next()?;
            match pattern {
                PathSegment::Literal(literal) => {
                    if literal != segment {
                        return None;
                    }
                }
                PathSegment::Param(name) => {
                    let value = urlencoding::decode(segment)
                        .map_or_else(|_| segment.to_string(), |decoded| decoded.into_owned());
                    params.insert(name.clone(), value);
                }
            }
        }

        if actual.next().is_some() {
            return None;
        }
        Some(params)
    }

    fn restage<Req2, Res2>(&self) -> Contract<Req2, Res2> {
        Contract {
            method: self.method.clone(),
            path: Arc::clone(&self.path),
            segments: Arc::clone(&self.segments),
            operation: self.operation.clone(),
            server_to_server: self.server_to_server,
            _shape: PhantomData,
        }
    }
}

impl<Req, Res> Clone for Contract<Req, Res> {
    fn clone(&self) -> Self {
        self.restage()
    }
}

impl<Req, Res> fmt::Debug for Contract<Req, Res> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contract")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("operation", &self.operation)
            .field("server_to_server", &self.server_to_server)
            .finish_non_exhaustive()
    }
}

/// Returns whether requests with this method carry a JSON body.
#[must_use]
pub fn method_has_body(method: &Method) -> bool {
    !matches!(
        *method,
        Method::GET | Method::DELETE | Method::HEAD | Method::OPTIONS
    )
}

fn parse_path(path: &str) -> Vec<PathSegment> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => PathSegment::Param(name.to_string()),
            _ => PathSegment::Literal(segment.to_string()),
        })
        .collect()
}
