//! Client and handler errors.

use std::time::Duration;

use swergio_core::CoreError;
use swergio_wire::FrameError;
use thiserror::Error;

/// Errors from a client session.
#[derive(Debug, Error)]
pub enum ClientError {
    /// TCP connect failed.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        /// Broker address.
        addr: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// TCP connect did not finish in time.
    #[error("connecting to {addr} timed out after {timeout:?}")]
    ConnectTimeout {
        /// Broker address.
        addr: String,
        /// Configured timeout.
        timeout: Duration,
    },

    /// Fatal framing fault on the inbound stream, or an unframeable message.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// A message could not be serialized.
    #[error(transparent)]
    Message(#[from] CoreError),

    /// The outbound queue is full.
    #[error("outbox full")]
    OutboxFull,

    /// The connection's writer has stopped.
    #[error("connection closed")]
    Closed,
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// A handler could not process a message.
///
/// Handler errors are logged at the dispatch boundary and never stop the
/// session loop.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Application-level failure.
    #[error("{0}")]
    Failed(String),

    /// A required payload field is absent.
    #[error("missing field `{0}`")]
    MissingField(String),

    /// A payload field has the wrong shape.
    #[error("invalid field `{field}`: {reason}")]
    InvalidField {
        /// Field name.
        field: String,
        /// What was wrong.
        reason: String,
    },

    /// Building the reply failed.
    #[error(transparent)]
    Message(#[from] CoreError),

    /// Decoding a payload field failed.
    #[error("payload decode: {0}")]
    Json(#[from] serde_json::Error),

    /// Sending an extra message from inside the handler failed.
    #[error("send from handler: {0}")]
    Send(#[from] ClientError),
}

impl HandlerError {
    /// Shorthand for [`HandlerError::Failed`].
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed(reason.into())
    }

    /// Shorthand for [`HandlerError::InvalidField`].
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
