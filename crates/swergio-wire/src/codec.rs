//! Length-prefixed frame codec.
//!
//! Wire format of one frame:
//!
//! ```text
//! | header: header_len bytes          | body: N bytes     |
//! | "78" left-aligned, space-padded   | JSON message      |
//! ```
//!
//! The header is the body length in ASCII decimal digits, right-padded with
//! spaces to exactly `header_len` bytes. Both ends of a connection must use
//! the same `header_len`; nothing on the wire announces it.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use swergio_core::Message;
use swergio_settings::TransportSettings;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};

use crate::errors::{FrameError, Result};

/// Header width used when nothing else is configured.
pub const DEFAULT_HEADER_LEN: usize = 10;

/// Frame limit used when nothing else is configured (16 MiB).
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Deployment-wide framing constants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameConfig {
    /// Width of the decimal length header in bytes.
    pub header_len: usize,
    /// Largest body accepted on read or produced on write.
    pub max_frame_len: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            header_len: DEFAULT_HEADER_LEN,
            max_frame_len: DEFAULT_MAX_FRAME_LEN,
        }
    }
}

impl From<&TransportSettings> for FrameConfig {
    fn from(t: &TransportSettings) -> Self {
        Self {
            header_len: t.header_length,
            max_frame_len: t.max_frame_bytes,
        }
    }
}

impl FrameConfig {
    /// Check that a body of `len` bytes can be framed.
    pub fn check_len(&self, len: usize) -> Result<()> {
        if len > self.max_frame_len {
            return Err(FrameError::Oversized {
                len,
                max: self.max_frame_len,
            });
        }
        if decimal_digits(len) > self.header_len {
            return Err(FrameError::HeaderOverflow {
                len,
                width: self.header_len,
            });
        }
        Ok(())
    }

    /// Write the header for a body of `len` bytes.
    fn put_header(&self, len: usize, dst: &mut BytesMut) -> Result<()> {
        self.check_len(len)?;
        let digits = len.to_string();
        dst.reserve(self.header_len + len);
        dst.put_slice(digits.as_bytes());
        dst.put_bytes(b' ', self.header_len - digits.len());
        Ok(())
    }

    /// Parse a header into a body length.
    fn parse_header(&self, head: &[u8]) -> Result<usize> {
        let invalid = || FrameError::InvalidHeader {
            header: String::from_utf8_lossy(head).into_owned(),
        };
        let text = std::str::from_utf8(head).map_err(|_| invalid())?.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let len: usize = text.parse().map_err(|_| invalid())?;
        if len > self.max_frame_len {
            return Err(FrameError::Oversized {
                len,
                max: self.max_frame_len,
            });
        }
        Ok(len)
    }
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum DecodeState {
    Head,
    Body(usize),
}

/// `tokio_util` codec turning a byte stream into frame bodies and back.
///
/// Items are raw JSON bodies (`Bytes`); the broker routes them without
/// parsing the payload, clients parse them with [`Message::from_json`].
#[derive(Debug)]
pub struct FrameCodec {
    config: FrameConfig,
    state: DecodeState,
}

impl FrameCodec {
    /// Codec with the given constants.
    pub fn new(config: FrameConfig) -> Self {
        Self {
            config,
            state: DecodeState::Head,
        }
    }

    /// Constants this codec frames with.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(FrameConfig::default())
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        loop {
            match self.state {
                DecodeState::Head => {
                    let width = self.config.header_len;
                    if src.len() < width {
                        src.reserve(width - src.len());
                        return Ok(None);
                    }
                    let len = self.config.parse_header(&src[..width])?;
                    src.advance(width);
                    src.reserve(len);
                    self.state = DecodeState::Body(len);
                }
                DecodeState::Body(len) => {
                    if src.len() < len {
                        return Ok(None);
                    }
                    self.state = DecodeState::Head;
                    return Ok(Some(src.split_to(len).freeze()));
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>> {
        if let Some(frame) = self.decode(src)? {
            return Ok(Some(frame));
        }
        match self.state {
            DecodeState::Head if src.is_empty() => Ok(None),
            DecodeState::Head => Err(FrameError::Truncated {
                expected: self.config.header_len,
                received: src.len(),
            }),
            DecodeState::Body(len) => Err(FrameError::Truncated {
                expected: len,
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, body: Bytes, dst: &mut BytesMut) -> Result<()> {
        self.config.put_header(body.len(), dst)?;
        dst.put_slice(&body);
        Ok(())
    }
}

/// Serialize `message` into a JSON body (no header).
pub fn encode_body(message: &Message) -> Result<Bytes> {
    Ok(Bytes::from(message.to_json()?))
}

/// Serialize `message` into one complete frame, header included.
pub fn encode(config: &FrameConfig, message: &Message) -> Result<Bytes> {
    let body = message.to_json()?;
    let mut buf = BytesMut::new();
    config.put_header(body.len(), &mut buf)?;
    buf.put_slice(&body);
    Ok(buf.freeze())
}

/// Read exactly one frame body from `reader`.
///
/// EOF before the first header byte is [`FrameError::Closed`]; EOF anywhere
/// later is [`FrameError::Truncated`].
pub async fn read_frame<R>(reader: &mut R, config: &FrameConfig) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut head = vec![0u8; config.header_len];
    let got = read_full(reader, &mut head).await?;
    if got == 0 {
        return Err(FrameError::Closed);
    }
    if got < head.len() {
        return Err(FrameError::Truncated {
            expected: head.len(),
            received: got,
        });
    }

    let len = config.parse_header(&head)?;
    let mut body = vec![0u8; len];
    let got = read_full(reader, &mut body).await?;
    if got < len {
        return Err(FrameError::Truncated {
            expected: len,
            received: got,
        });
    }
    Ok(Bytes::from(body))
}

/// Read and parse exactly one message from `reader`.
pub async fn decode<R>(reader: &mut R, config: &FrameConfig) -> Result<Message>
where
    R: AsyncRead + Unpin,
{
    let body = read_frame(reader, config).await?;
    Ok(Message::from_json(&body)?)
}

/// Encode `message` and write it to `writer` in a single write.
pub async fn write_message<W>(writer: &mut W, config: &FrameConfig, message: &Message) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode(config, message)?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
