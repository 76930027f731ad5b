//! Server error types.

use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Invalid construction parameters.
    #[error("invalid configuration: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Failed to listen or bind on the configured address.
    #[error("failed to bind {network} {address}: {source}")]
    Bind {
        /// The network name.
        network: String,
        /// The address that failed to bind.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Server is already started.
    #[error("server already started")]
    AlreadyStarted,

    /// Server is not started.
    #[error("server not started")]
    NotStarted,
}

impl ServerError {
    /// Returns `true` for lifecycle misuse (`AlreadyStarted`, `NotStarted`).
    #[must_use]
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::AlreadyStarted | Self::NotStarted)
    }
}

/// Result type alias for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
