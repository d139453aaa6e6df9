//! Broker errors.

use thiserror::Error;

/// Errors surfaced by the broker to its owner.
///
/// Per-connection faults (bad frames, disconnects) never reach this type;
/// they end the affected connection and are logged.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The listening socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Socket error on the listener.
    #[error("broker i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;
