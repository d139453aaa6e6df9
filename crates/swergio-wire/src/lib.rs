//! # swergio-wire
//!
//! Framing for swergio connections: every message travels as one frame made
//! of a fixed-width ASCII decimal length header followed by a UTF-8 JSON
//! body.
//!
//! - [`FrameCodec`] plugs into `tokio_util::codec::{FramedRead, FramedWrite}`
//! - [`encode`] / [`decode`] handle a single message directly
//! - [`FrameError`] separates fatal framing faults from disconnects

#![deny(unsafe_code)]

pub mod codec;
pub mod errors;

pub use codec::{
    DEFAULT_HEADER_LEN, DEFAULT_MAX_FRAME_LEN, FrameCodec, FrameConfig, decode, encode, encode_body,
    read_frame, write_message,
};
pub use errors::{FrameError, Result};
