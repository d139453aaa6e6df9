//! Settings types.
//!
//! Every field has a compiled default so a partial `settings.json` only needs
//! the keys it changes. Keys are camelCase on disk.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// The only text encoding every peer is guaranteed to speak.
pub const UTF8: &str = "utf-8";

/// Widest header accepted. Twenty decimal digits cover `u64::MAX`.
pub const MAX_HEADER_LENGTH: usize = 20;

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwergioSettings {
    /// Wire-level constants shared by the broker and every client.
    pub transport: TransportSettings,
    /// Broker-only settings.
    pub broker: BrokerSettings,
    /// Client-only settings.
    pub client: ClientSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl SwergioSettings {
    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        self.transport.validate()?;
        if self.broker.max_connections == 0 {
            return Err(SettingsError::InvalidValue("broker.maxConnections must be > 0".into()));
        }
        if self.broker.outbound_buffer == 0 {
            return Err(SettingsError::InvalidValue("broker.outboundBuffer must be > 0".into()));
        }
        if self.client.outbound_buffer == 0 {
            return Err(SettingsError::InvalidValue("client.outboundBuffer must be > 0".into()));
        }
        Ok(())
    }
}

/// Wire constants. Every peer of a deployment must use identical values.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransportSettings {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Width of the ASCII decimal length header, in bytes.
    pub header_length: usize,
    /// Text encoding of headers and bodies.
    pub encoding: String,
    /// Largest frame body a peer accepts.
    pub max_frame_bytes: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            header_length: 10,
            encoding: UTF8.to_string(),
            max_frame_bytes: 16 * 1024 * 1024, // 16 MB
        }
    }
}

impl TransportSettings {
    /// `host:port` for binding or connecting.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check that the header can express every allowed frame length.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_HEADER_LENGTH).contains(&self.header_length) {
            return Err(SettingsError::InvalidValue(format!(
                "transport.headerLength must be within 1..={MAX_HEADER_LENGTH}, got {}",
                self.header_length
            )));
        }
        if !self.encoding.eq_ignore_ascii_case(UTF8) && !self.encoding.eq_ignore_ascii_case("utf8") {
            return Err(SettingsError::InvalidValue(format!(
                "transport.encoding `{}` is not supported (only {UTF8})",
                self.encoding
            )));
        }
        if self.max_frame_bytes == 0 {
            return Err(SettingsError::InvalidValue("transport.maxFrameBytes must be > 0".into()));
        }
        let digits = self.max_frame_bytes.to_string().len();
        if digits > self.header_length {
            return Err(SettingsError::InvalidValue(format!(
                "transport.maxFrameBytes {} needs {digits} header digits but headerLength is {}",
                self.max_frame_bytes, self.header_length
            )));
        }
        Ok(())
    }
}

/// Broker settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BrokerSettings {
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection backlog at which a slow reader is reported.
    pub outbound_buffer: usize,
    /// How long shutdown waits for connection tasks, in milliseconds.
    pub shutdown_timeout_ms: u64,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            max_connections: 256,
            outbound_buffer: 1024,
            shutdown_timeout_ms: 5_000,
        }
    }
}

/// Client settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// Frames queued by `send` before it reports a full outbox.
    pub outbound_buffer: usize,
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            outbound_buffer: 1024,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default `EnvFilter` directive (`RUST_LOG` overrides it).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
