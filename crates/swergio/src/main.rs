//! # swergio
//!
//! Broker binary and small command-line peers: `serve` runs the broker,
//! `send` publishes one message, `tail` prints everything sent to a room.

#![deny(unsafe_code)]

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use swergio_client::{Client, ClientConfig};
use swergio_core::{Message, MessageType};
use swergio_server::{Broker, BrokerConfig};
use swergio_settings::SwergioSettings;
use tracing::info;

/// swergio message broker.
#[derive(Parser, Debug)]
#[command(name = "swergio", about = "swergio message broker and tools")]
struct Cli {
    /// Settings file (defaults to `$SWERGIO_SETTINGS` or `~/.swergio/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Broker host (overrides settings).
    #[arg(long, global = true)]
    host: Option<String>,

    /// Broker port (overrides settings).
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Length header width in bytes (overrides settings).
    #[arg(long, global = true)]
    header_length: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the broker until Ctrl-C.
    Serve {
        /// Maximum concurrent connections (overrides settings).
        #[arg(long)]
        max_connections: Option<usize>,
    },
    /// Send one message to a room.
    Send {
        /// Destination room.
        #[arg(long)]
        room: String,
        /// Message type: the wire form (`DATA.CUSTOM`) or its suffix in any
        /// case (`custom`).
        #[arg(long = "type", default_value = "DATA.TEXT")]
        kind: MessageType,
        /// `DATA` field; parsed as JSON, or sent as a string if it is not JSON.
        #[arg(long)]
        data: Option<String>,
        /// Component name used in logs.
        #[arg(long, default_value = "swergio-send")]
        name: String,
    },
    /// Join a room and print each message as one JSON line.
    Tail {
        /// Room to join.
        #[arg(long)]
        room: String,
        /// Component name used in logs.
        #[arg(long, default_value = "swergio-tail")]
        name: String,
    },
}

impl Cli {
    /// Settings file layers, env, then command-line flags.
    fn settings(&self) -> Result<SwergioSettings> {
        let path = self.settings.clone().unwrap_or_else(swergio_settings::settings_path);
        let mut settings = swergio_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        if let Some(host) = &self.host {
            settings.transport.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.transport.port = port;
        }
        if let Some(width) = self.header_length {
            settings.transport.header_length = width;
        }
        if let Command::Serve {
            max_connections: Some(n),
        } = self.command
        {
            settings.broker.max_connections = n;
        }
        settings.validate().context("Invalid settings")?;
        Ok(settings)
    }
}

/// `--data` as JSON when it parses, otherwise as a plain string.
fn parse_data(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

async fn serve(settings: &SwergioSettings) -> Result<()> {
    let broker = Broker::bind(BrokerConfig::from_settings(settings))
        .await
        .context("Failed to start broker")?;
    let shutdown = broker.shutdown().clone();
    let _ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, shutting down");
            shutdown.shutdown();
        }
    });
    broker.run().await.context("Broker failed")?;
    Ok(())
}

async fn send(settings: &SwergioSettings, name: String, room: String, kind: MessageType, data: Option<String>) -> Result<()> {
    let client = Client::connect(ClientConfig::from_settings(name, settings), ())
        .await
        .context("Failed to connect to broker")?;
    let mut message = Message::new(kind, room);
    if let Some(raw) = data {
        message = message.with_field("DATA", parse_data(&raw))?;
    }
    client.send(&message).context("Failed to queue message")?;
    info!(message_id = %message.id, "message sent");
    client.close().await;
    Ok(())
}

async fn tail(settings: &SwergioSettings, name: String, room: String) -> Result<()> {
    let mut client = Client::connect(ClientConfig::from_settings(name, settings), ())
        .await
        .context("Failed to connect to broker")?;
    let _ = client.join_room(room.as_str())?;
    info!(room = %room, "tailing");

    let mut stdout = std::io::stdout().lock();
    loop {
        let next = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            next = client.receive() => next?,
        };
        let Some(message) = next else {
            info!("broker closed the connection");
            break;
        };
        let line = message.to_json()?;
        stdout.write_all(&line)?;
        stdout.write_all(b"\n")?;
        stdout.flush()?;
    }
    client.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = cli.settings()?;

    if settings.logging.json {
        swergio_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        swergio_core::logging::init_subscriber(&settings.logging.level);
    }

    match cli.command {
        Command::Serve { .. } => serve(&settings).await,
        Command::Send { room, kind, data, name } => send(&settings, name, room, kind, data).await,
        Command::Tail { room, name } => tail(&settings, name, room).await,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_defaults() {
        let cli = parse(&["swergio", "send", "--room", "galactic_chat", "--data", "Hello World!"]);
        match cli.command {
            Command::Send { room, kind, data, name } => {
                assert_eq!(room, "galactic_chat");
                assert_eq!(kind, MessageType::Text);
                assert_eq!(data.as_deref(), Some("Hello World!"));
                assert_eq!(name, "swergio-send");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn send_type_accepts_short_names() {
        for (arg, expected) in [
            ("text", MessageType::Text),
            ("Forward", MessageType::Forward),
            ("DATA.GRADIENT", MessageType::Gradient),
            ("custom", MessageType::Custom),
        ] {
            let cli = parse(&["swergio", "send", "--room", "r", "--type", arg]);
            let Command::Send { kind, .. } = cli.command else {
                panic!("expected send");
            };
            assert_eq!(kind, expected);
        }
        let cli = parse(&["swergio", "send", "--room", "r", "--type", "APP.PING"]);
        let Command::Send { kind, .. } = cli.command else {
            panic!("expected send");
        };
        assert_eq!(kind, MessageType::Other("APP.PING".into()));
    }

    #[test]
    fn flags_override_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transport": {"port": 9000, "headerLength": 12}}"#).unwrap();
        let path = path.to_str().unwrap();

        let cli = parse(&["swergio", "--settings", path, "serve", "--port", "9100", "--max-connections", "3"]);
        let settings = cli.settings().unwrap();
        assert_eq!(settings.transport.port, 9100);
        assert_eq!(settings.transport.header_length, 12);
        assert_eq!(settings.broker.max_connections, 3);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let cli = parse(&["swergio", "--settings", path.to_str().unwrap(), "--header-length", "0", "tail", "--room", "r"]);
        assert!(cli.settings().is_err());
    }

    #[test]
    fn data_is_json_when_possible() {
        assert_eq!(parse_data("[1, 2]"), serde_json::json!([1, 2]));
        assert_eq!(parse_data("{\"a\": true}"), serde_json::json!({"a": true}));
        assert_eq!(parse_data("Hello World!"), Value::String("Hello World!".into()));
    }
}
