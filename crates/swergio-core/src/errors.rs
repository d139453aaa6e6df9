//! Errors raised while building or parsing messages.

use thiserror::Error;

/// Errors from the message model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A payload key collides with one of the protocol-reserved keys.
    #[error("payload key `{0}` is reserved by the protocol")]
    ReservedKey(String),

    /// A payload was built from a JSON value that is not an object.
    #[error("payload must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// The message body is not valid JSON or misses a required key.
    #[error("invalid message body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for message model operations.
pub type Result<T> = std::result::Result<T, CoreError>;
