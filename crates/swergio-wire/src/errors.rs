//! Framing errors.

use swergio_core::CoreError;
use thiserror::Error;

/// Errors raised while reading or writing frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The length header is not a decimal integer.
    #[error("invalid frame header {header:?}")]
    InvalidHeader {
        /// Raw header text (lossy UTF-8).
        header: String,
    },

    /// The body length needs more digits than the header holds.
    #[error("frame length {len} does not fit a {width}-byte header")]
    HeaderOverflow {
        /// Body length in bytes.
        len: usize,
        /// Configured header width.
        width: usize,
    },

    /// The body exceeds the configured frame limit.
    #[error("frame of {len} bytes exceeds the {max}-byte limit")]
    Oversized {
        /// Declared or actual body length.
        len: usize,
        /// Configured limit.
        max: usize,
    },

    /// The stream ended inside a header or body.
    #[error("stream closed mid-frame: expected {expected} bytes, received {received}")]
    Truncated {
        /// Bytes the current header or body needed.
        expected: usize,
        /// Bytes that actually arrived.
        received: usize,
    },

    /// The stream ended cleanly at a frame boundary.
    #[error("connection closed")]
    Closed,

    /// The frame body is not a valid message.
    #[error(transparent)]
    Payload(#[from] CoreError),

    /// Underlying socket error.
    #[error("frame i/o: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// A malformed header. The stream has lost frame alignment and must be
    /// closed.
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader { .. } | Self::HeaderOverflow { .. } | Self::Oversized { .. }
        )
    }

    /// The peer went away, cleanly or not.
    pub fn is_disconnect(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::Closed | Self::Io(_))
    }
}

/// Result type for framing operations.
pub type Result<T> = std::result::Result<T, FrameError>;
