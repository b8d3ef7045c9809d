//! # Covenant Extract
//!
//! Turns raw HTTP request parts into validated request values, and handler
//! results back into HTTP responses.
//!
//! - [`merge`] / [`MergedRequest`] - Combine path, query and body by method, then validate
//! - [`Reply`] - Success envelope with status, headers and cookies
//! - [`error_response`] - Error envelope rendering
//! - [`SetCookie`] - Response cookies
//! - [`ExtractionError`] - What can go wrong while merging

#![doc(html_root_url = "https://docs.rs/covenant-extract/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cookie;
mod error;
pub mod merge;
pub mod response;

pub use cookie::{SameSite, SetCookie};
pub use error::{ExtractionError, ExtractionSource};
pub use merge::{merge, FieldValue, MergedRequest};
pub use response::{error_response, Reply};
