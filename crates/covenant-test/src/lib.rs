//! # Covenant Test
//!
//! Exercises contracts end to end without binding a port.
//!
//! - [`TestApp`] - Wraps a [`Dispatcher`](covenant_server::Dispatcher); hands out clients and raw requests
//! - [`InMemoryTransport`] - A client transport that calls the dispatcher directly and records requests
//! - [`TestResponse`] - Buffered response with assertion helpers

#![doc(html_root_url = "https://docs.rs/covenant-test/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod app;
mod error;
mod response;
mod transport;

pub use app::{TestApp, TestRequest, TEST_BASE_URL};
pub use error::TestError;
pub use response::TestResponse;
pub use transport::{InMemoryTransport, RecordedRequest};
