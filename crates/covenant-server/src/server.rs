//! HTTP host.
//!
//! [`Server`] accepts HTTP/1.1 connections with Hyper and hands each
//! request to a [`Dispatcher`]. Around dispatch it enforces the body size
//! limit (413) and the request timeout (504). On shutdown it stops
//! accepting, then waits up to the configured grace period for open
//! connections.
//!
//! ```rust,no_run
//! use covenant_server::{Dispatcher, Server, ServerConfig};
//!
//! # async fn run() -> Result<(), covenant_server::ServerError> {
//! let config = ServerConfig::builder().http_addr("0.0.0.0:8080").build();
//! Server::new(config, Dispatcher::new()).run().await
//! # }
//! ```

use crate::{Dispatcher, ServerConfig, ServerError, ShutdownSignal};
use bytes::Bytes;
use covenant_core::CovenantError;
use covenant_extract::error_response;
use http::{Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinSet;

/// Response type produced for Hyper.
pub type HttpResponse = Response<Full<Bytes>>;

/// The HTTP host for a [`Dispatcher`].
#[derive(Debug)]
pub struct Server {
    config: ServerConfig,
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    /// Creates a server.
    #[must_use]
    pub fn new(config: ServerConfig, dispatcher: Dispatcher) -> Self {
        Self {
            config,
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serves until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is invalid or taken.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals())
            .await
    }

    /// Serves until `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is invalid or taken.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("invalid address `{}`: {e}", self.config.http_addr()))
        })?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind {addr}: {e}")))?;
        self.serve(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` is triggered.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener's address cannot be read.
    pub async fn serve(
        self,
        listener: TcpListener,
        shutdown: ShutdownSignal,
    ) -> Result<(), ServerError> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            routes = self.dispatcher.len(),
            "server listening"
        );

        let server = Arc::new(self);
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote_addr)) => {
                        let server = Arc::clone(&server);
                        let shutdown = shutdown.clone();
                        connections.spawn(async move {
                            server.handle_connection(stream, remote_addr, shutdown).await;
                        });
                    }
                    Err(e) => tracing::error!(error = %e, "failed to accept connection"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                () = shutdown.wait() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let grace = server.config.shutdown_timeout();
        tracing::info!(
            open_connections = connections.len(),
            grace_ms = u64::try_from(grace.as_millis()).unwrap_or(u64::MAX),
            "draining connections"
        );

        let drained = tokio::time::timeout(grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                open_connections = connections.len(),
                "shutdown grace period elapsed, aborting open connections"
            );
            connections.shutdown().await;
        }

        tracing::info!("server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) {
        let server = Arc::clone(&self);
        let service = service_fn(move |request: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { Ok::<_, Infallible>(server.handle_request(request).await) }
        });

        let connection = http1::Builder::new().serve_connection(TokioIo::new(stream), service);
        tokio::pin!(connection);

        tokio::select! {
            result = connection.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(remote = %remote_addr, error = %e, "connection error");
                }
            }
            () = shutdown.wait() => {
                // Let the in-flight request finish, then close.
                connection.as_mut().graceful_shutdown();
                if let Err(e) = connection.await {
                    tracing::debug!(remote = %remote_addr, error = %e, "connection error during shutdown");
                }
            }
        }
    }

    async fn handle_request(&self, request: Request<Incoming>) -> HttpResponse {
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let outcome = tokio::time::timeout(self.config.request_timeout(), async {
            let (parts, body) = request.into_parts();
            let bytes = match Limited::new(body, self.config.max_body_bytes()).collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
                    tracing::debug!(http.method = %parts.method, http.path = parts.uri.path(), "request body too large");
                    return error_response(&CovenantError::http(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        format!("Request body exceeds {} bytes", self.config.max_body_bytes()),
                    ));
                }
                Err(e) => {
                    tracing::debug!(error = %e, "failed to read request body");
                    return error_response(&CovenantError::validation("Failed to read request body"));
                }
            };
            self.dispatcher
                .dispatch(Request::from_parts(parts, bytes))
                .await
        })
        .await;

        let response = outcome.unwrap_or_else(|_| {
            tracing::warn!(http.method = %method, http.path = %path, "request timed out");
            error_response(&CovenantError::http(
                StatusCode::GATEWAY_TIMEOUT,
                "Request timed out",
            ))
        });

        response.map(Full::new)
    }
}
