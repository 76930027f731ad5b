//! Client error types.

use thiserror::Error;

/// Errors that can occur in the client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Failed to open the connection.
    #[error("failed to dial {network} {address}: {source}")]
    Dial {
        /// The network name.
        network: String,
        /// The address that was dialed.
        address: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to the connection.
    #[error("send failed: {0}")]
    Send(#[from] std::io::Error),

    /// Client is already started.
    #[error("client already started")]
    AlreadyStarted,

    /// Client is not started.
    #[error("client not started")]
    NotStarted,
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;
