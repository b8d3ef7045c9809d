//! Host server errors.

use thiserror::Error;

/// Errors that stop [`Server::run`](crate::Server::run).
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listener could not be bound.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server was set up inconsistently.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O failure outside any single connection.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
