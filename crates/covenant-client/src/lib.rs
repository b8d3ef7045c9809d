//! # Covenant Client
//!
//! Invokes [`Contract`](covenant_core::Contract)s over HTTP.
//!
//! - [`Client`] / [`ClientConfig`] - An explicit client value; there is no global configuration
//! - [`InvokeOptions`] - Per-call headers and opting out of bearer auth
//! - [`TokenProvider`] / [`StaticToken`] - Bearer tokens
//! - [`RequestSigner`] / [`Ed25519Signer`] - Signed server-to-server calls
//! - [`Transport`] / [`ReqwestTransport`] - The network layer, replaceable in tests
//! - [`ClientError`] - Typed failures, including the server's error envelope
//!
//! Path parameters are filled from request fields. The remaining fields go
//! to the query string for `GET` and `DELETE`, and to a JSON body otherwise.

#![doc(html_root_url = "https://docs.rs/covenant-client/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod client;
mod error;
pub mod request;
mod transport;

pub use auth::{Ed25519Signer, RequestSigner, StaticToken, TokenProvider};
pub use client::{Client, ClientConfig, Invoke, InvokeOptions};
pub use error::{ClientError, ClientResult};
pub use request::{render, RenderedRequest};
pub use transport::{ReqwestTransport, Transport};
