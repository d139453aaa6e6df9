//! Broker configuration.

use std::time::Duration;

use swergio_settings::SwergioSettings;
use swergio_wire::FrameConfig;

/// Runtime configuration for a [`Broker`](crate::Broker).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BrokerConfig {
    /// `host:port` to listen on.
    pub bind_addr: String,
    /// Framing constants shared with every client.
    pub frame: FrameConfig,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Backlog per connection at which a slow reader is reported.
    pub outbound_buffer: usize,
    /// How long shutdown waits for connection tasks.
    pub shutdown_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:0".into(),
            frame: FrameConfig::default(),
            max_connections: 256,
            outbound_buffer: 1024,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl BrokerConfig {
    /// Derive the broker configuration from loaded settings.
    pub fn from_settings(settings: &SwergioSettings) -> Self {
        Self {
            bind_addr: settings.transport.address(),
            frame: FrameConfig::from(&settings.transport),
            max_connections: settings.broker.max_connections,
            outbound_buffer: settings.broker.outbound_buffer,
            shutdown_timeout: Duration::from_millis(settings.broker.shutdown_timeout_ms),
        }
    }
}
