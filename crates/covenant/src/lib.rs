//! # Covenant
//!
//! **Typed HTTP contracts shared by server and client**
//!
//! A [`Contract`](core::Contract) names a method, a path template and the
//! request and response shapes of one operation. The same value drives:
//!
//! - **Dispatch** – [`Dispatcher`](server::Dispatcher) merges path, query and body into the request type, validates it and renders the reply
//! - **Invocation** – [`Client`](client::Client) splits the request back into path, query and body, signs server-to-server calls and decodes the reply
//! - **Quotas** – [`RateLimiter`](ratelimit::RateLimiter) counts fixed-window operations in memory or in Redis
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use covenant::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct GetUser { id: u64 }
//! impl Validate for GetUser {}
//!
//! #[derive(Serialize, Deserialize)]
//! struct User { id: u64, name: String }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let get_user = Contract::get("/users/:id").with_request::<GetUser>().with_response::<User>();
//!
//!     let dispatcher = Dispatcher::new().route(&get_user, |_ctx, req: GetUser| async move {
//!         Ok(Reply::ok(User { id: req.id, name: "Ada".into() }))
//!     });
//!
//!     Server::new(ServerConfig::default(), dispatcher).run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request flow
//!
//! ```text
//! Client → render → sign → Transport ─→ Dispatcher → route → authenticate → merge → validate → Handler
//!                                                                                               ↓
//! Client ← decode ← error envelope / body ←──────────────────── Reply / CovenantError ←────────┘
//! ```

#![doc(html_root_url = "https://docs.rs/covenant/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Contracts, context, errors, validation
pub use covenant_core as core;

// Request merging and reply rendering
pub use covenant_extract as extract;

// Dispatcher and HTTP server
pub use covenant_server as server;

// Contract client
pub use covenant_client as client;

// Fixed-window rate limiting
pub use covenant_ratelimit as ratelimit;

// Configuration loading
pub use covenant_config as config;

// Logging setup
pub use covenant_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use covenant::prelude::*;
///
/// let ping = Contract::get("/ping").with_response::<String>();
/// assert_eq!(ping.operation(), "GET /ping");
/// ```
pub mod prelude {
    pub use covenant_core::{
        Caller, Contract, CovenantError, CovenantResult, Empty, FieldIssues, RequestContext,
        RequestId, Untyped, Validate,
    };

    pub use covenant_extract::{Reply, SameSite, SetCookie};

    pub use covenant_server::{Dispatcher, Server, ServerConfig, ShutdownSignal};

    pub use covenant_client::{
        Client, ClientConfig, ClientError, Ed25519Signer, Invoke, InvokeOptions, StaticToken,
    };

    pub use covenant_ratelimit::{Period, RateLimitContext, RateLimitRule, RateLimiter};

    pub use covenant_config::{ConfigLoader, CovenantConfig};

    pub use covenant_telemetry::{init_logging, LogConfig};
}
