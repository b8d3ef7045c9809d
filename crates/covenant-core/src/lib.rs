//! # Covenant Core
//!
//! Core types shared by both sides of a Covenant RPC.
//!
//! This crate provides the foundational types used throughout Covenant:
//!
//! - [`Contract`] - Immutable declaration of one RPC (method, path, shapes, auth mode)
//! - [`Validate`] - Per-type validation hook run after a request is merged
//! - [`CovenantError`] - Error taxonomy and its HTTP envelope
//! - [`RequestContext`] - Per-request context handed to handlers
//! - [`Caller`] - Who made the call (anonymous, bearer, user, service)
//! - [`signing`] - Canonical server-to-server signing payload and header names

#![doc(html_root_url = "https://docs.rs/covenant-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod contract;
mod context;
mod error;
mod identity;
pub mod signing;
mod validate;

pub use context::{RequestContext, RequestId};
pub use contract::{Contract, Empty, PathSegment, RequestShape, ResponseShape, Untyped};
pub use error::{CovenantError, CovenantResult, ErrorCategory, ErrorEnvelope};
pub use identity::Caller;
pub use validate::{FieldIssue, FieldIssues, Validate};
