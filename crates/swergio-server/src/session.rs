//! Per-connection task: read frames, apply membership commands, route the
//! rest.

use std::sync::Arc;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use swergio_core::{ConnectionId, MessageType, RouteHeader};
use swergio_wire::{FrameCodec, FrameConfig};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::connection::BrokerConnection;
use crate::metrics::{CONNECTIONS_ACTIVE, FRAMES_INVALID_TOTAL, ROUTING_MISS_TOTAL};
use crate::registry::RoomRegistry;

/// Why a connection task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionExit {
    /// Peer closed the socket at a frame boundary.
    Closed,
    /// Peer closed mid-frame or the socket failed.
    Disconnected,
    /// Peer sent a malformed header.
    FramingError,
    /// Broker is shutting down.
    Shutdown,
}

impl ConnectionExit {
    fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Disconnected => "disconnected",
            Self::FramingError => "framing_error",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Serve one accepted connection until it closes or `cancel` fires.
///
/// `connection` must already be registered; it is removed from the registry
/// and from every room on exit.
#[instrument(skip_all, fields(conn_id = %connection.id, peer = %connection.peer))]
pub async fn run_connection(
    stream: TcpStream,
    connection: Arc<BrokerConnection>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    registry: Arc<RoomRegistry>,
    frame: FrameConfig,
    cancel: CancellationToken,
) -> ConnectionExit {
    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, FrameCodec::new(frame));
    let mut sink = FramedWrite::new(write_half, FrameCodec::new(frame));

    let writer = {
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            while let Some(body) = outbound.recv().await {
                connection.written();
                if let Err(e) = sink.send(body).await {
                    debug!(error = %e, "write failed, stopping writer");
                    break;
                }
            }
        })
    };

    info!("connection opened");
    let id = connection.id.clone();

    let exit = loop {
        tokio::select! {
            () = cancel.cancelled() => break ConnectionExit::Shutdown,
            next = frames.next() => match next {
                None => break ConnectionExit::Closed,
                Some(Ok(body)) => handle_frame(&registry, &id, &body),
                Some(Err(e)) if e.is_framing() => {
                    warn!(error = %e, "framing error, closing connection");
                    break ConnectionExit::FramingError;
                }
                Some(Err(e)) => {
                    debug!(error = %e, "connection lost");
                    break ConnectionExit::Disconnected;
                }
            }
        }
    };

    let rooms = registry.disconnect(&id);
    writer.abort();
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
    info!(
        reason = exit.as_str(),
        rooms = rooms.len(),
        dropped_frames = connection.drop_count(),
        age_ms = connection.age().as_millis(),
        "connection closed"
    );
    exit
}

/// Apply one inbound frame: membership commands change the registry,
/// everything else is fanned out to its room.
fn handle_frame(registry: &RoomRegistry, sender: &ConnectionId, body: &Bytes) {
    let header = match RouteHeader::peek(body) {
        Ok(h) => h,
        Err(e) => {
            warn!(error = %e, len = body.len(), "unparsable frame body, skipping");
            counter!(FRAMES_INVALID_TOTAL).increment(1);
            return;
        }
    };

    let Some(room) = header.to_room else {
        if header.kind.is_control() {
            warn!(kind = %header.kind, "membership command without TO_ROOM");
        } else {
            debug!(kind = %header.kind, "frame without TO_ROOM, dropped");
            counter!(ROUTING_MISS_TOTAL).increment(1);
        }
        return;
    };

    match header.kind {
        MessageType::Join => {
            if registry.join(sender, &room) {
                info!(room = %room, "joined room");
            }
        }
        MessageType::Leave => {
            if registry.leave(sender, &room) {
                info!(room = %room, "left room");
            }
        }
        _ => {
            let _ = registry.route(sender, &room, body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(reg: &RoomRegistry, id: &str) -> (Arc<BrokerConnection>, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = Arc::new(BrokerConnection::new(
            ConnectionId::from(id),
            "127.0.0.1:1".parse().unwrap(),
            tx,
            8,
        ));
        reg.register(conn.clone());
        (conn, rx)
    }

    #[test]
    fn join_and_leave_frames_change_membership() {
        let reg = RoomRegistry::new();
        let (a, _rx) = registered(&reg, "a");
        let room = swergio_core::RoomName::from("control");

        handle_frame(&reg, &a.id, &Bytes::from_static(br#"{"ID":"1","TYPE":"CONTROL.JOIN","TO_ROOM":"control"}"#));
        assert_eq!(reg.room_members(&room), vec![a.id.clone()]);

        handle_frame(&reg, &a.id, &Bytes::from_static(br#"{"ID":"2","TYPE":"CONTROL.LEAVE","TO_ROOM":"control"}"#));
        assert!(reg.room_members(&room).is_empty());
    }

    #[test]
    fn data_frames_are_forwarded_unmodified() {
        let reg = RoomRegistry::new();
        let (a, _rx_a) = registered(&reg, "a");
        let (b, mut rx_b) = registered(&reg, "b");
        let _ = reg.join(&b.id, &swergio_core::RoomName::from("r"));

        let body = Bytes::from_static(br#"{"ID":"3","TYPE":"DATA.CUSTOM","TO_ROOM":"r",  "X" : 1}"#);
        handle_frame(&reg, &a.id, &body);
        assert_eq!(rx_b.try_recv().unwrap(), body);
    }

    #[test]
    fn control_messages_are_not_forwarded() {
        let reg = RoomRegistry::new();
        let (a, _rx_a) = registered(&reg, "a");
        let (b, mut rx_b) = registered(&reg, "b");
        let _ = reg.join(&b.id, &swergio_core::RoomName::from("r"));

        handle_frame(&reg, &a.id, &Bytes::from_static(br#"{"ID":"4","TYPE":"CONTROL.JOIN","TO_ROOM":"r"}"#));
        assert!(rx_b.try_recv().is_err());
        assert_eq!(reg.room_members(&swergio_core::RoomName::from("r")).len(), 2);
    }

    #[test]
    fn garbage_and_roomless_frames_are_skipped() {
        let reg = RoomRegistry::new();
        let (a, _rx) = registered(&reg, "a");
        handle_frame(&reg, &a.id, &Bytes::from_static(b"not json"));
        handle_frame(&reg, &a.id, &Bytes::from_static(br#"{"ID":"5","TYPE":"DATA.TEXT"}"#));
        handle_frame(&reg, &a.id, &Bytes::from_static(br#"{"ID":"6","TYPE":"CONTROL.JOIN"}"#));
        assert_eq!(reg.room_count(), 0);
    }

    #[test]
    fn exit_reasons() {
        assert_eq!(ConnectionExit::FramingError.as_str(), "framing_error");
        assert_eq!(ConnectionExit::Shutdown.as_str(), "shutdown");
    }
}
