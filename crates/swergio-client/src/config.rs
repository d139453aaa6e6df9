//! Client configuration.

use std::time::Duration;

use swergio_core::ParticipantId;
use swergio_settings::SwergioSettings;
use swergio_wire::FrameConfig;

/// How a [`Client`](crate::Client) connects and frames.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Component name, used in logs.
    pub name: ParticipantId,
    /// Broker `host:port`.
    pub addr: String,
    /// Framing constants; must match the broker's.
    pub frame: FrameConfig,
    /// Frames queued before `send` reports a full outbox.
    pub outbound_buffer: usize,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Config with default framing for the broker at `addr`.
    pub fn new(name: impl Into<ParticipantId>, addr: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            addr: addr.into(),
            frame: FrameConfig::default(),
            outbound_buffer: 1024,
            connect_timeout: Duration::from_secs(5),
        }
    }

    /// Derive the config from loaded settings.
    pub fn from_settings(name: impl Into<ParticipantId>, settings: &SwergioSettings) -> Self {
        Self {
            name: name.into(),
            addr: settings.transport.address(),
            frame: FrameConfig::from(&settings.transport),
            outbound_buffer: settings.client.outbound_buffer,
            connect_timeout: Duration::from_millis(settings.client.connect_timeout_ms),
        }
    }
}
