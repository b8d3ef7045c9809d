//! # Covenant Rate Limit
//!
//! Fixed-window quotas for sensitive actions, such as sending sign-in
//! emails, counted in a store shared by every instance.
//!
//! - [`RateLimitRule`] / [`Period`] - What is limited, by what, and how often
//! - [`RateLimiter`] - Counts calls and rejects the ones over the limit
//! - [`CounterStore`] - The atomic-increment primitive the limiter relies on
//! - [`MemoryCounterStore`] / [`RedisCounterStore`] - Store implementations
//!
//! Correctness rests entirely on the store's atomic increment. The limiter
//! keeps no state of its own and never retries a failed store call.
//!
//! A rejected call surfaces as [`RateLimitError::Exceeded`], which converts
//! into a 429 [`CovenantError`](covenant_core::CovenantError) with a
//! `Retry-After` hint.

#![doc(html_root_url = "https://docs.rs/covenant-ratelimit/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod limiter;
mod redis_store;
mod rule;
mod store;

pub use error::{RateLimitError, StoreError};
pub use limiter::{RateLimitContext, RateLimitStatus, RateLimiter};
pub use redis_store::RedisCounterStore;
pub use rule::{Period, RateLimitRule};
pub use store::{CounterStore, MemoryCounterStore, DEFAULT_SWEEP_INTERVAL};
