//! # Covenant Server
//!
//! Serves [`Contract`](covenant_core::Contract)s.
//!
//! - [`Dispatcher`] - Routes requests to typed handlers and renders replies and errors
//! - [`TokenVerifier`] / [`SignatureVerifier`] / [`Ed25519Verifier`] - Caller authentication
//! - [`Server`] / [`ServerConfig`] - Hyper HTTP/1.1 host with body limit, timeout and graceful shutdown
//! - [`ShutdownSignal`] - Trigger-once shutdown latch
//!
//! The dispatcher is independent of the host: anything that can produce an
//! `http::Request<Bytes>` can call [`Dispatcher::dispatch`].

#![doc(html_root_url = "https://docs.rs/covenant-server/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod config;
mod dispatcher;
mod error;
mod server;
mod shutdown;

pub use auth::{bearer_token, Ed25519Verifier, SignatureVerifier, TokenVerifier};
pub use config::{ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_MAX_BODY_BYTES};
pub use dispatcher::{
    BoxedHandlerFuture, Dispatcher, ErasedHandler, Invocation, DEFAULT_SIGNATURE_TOLERANCE,
    REQUEST_ID_HEADER,
};
pub use error::ServerError;
pub use server::{HttpResponse, Server};
pub use shutdown::ShutdownSignal;
