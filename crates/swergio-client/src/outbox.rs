//! Outbound queue shared by a session and its handlers.

use bytes::Bytes;
use futures::SinkExt;
use swergio_core::Message;
use swergio_wire::{FrameCodec, FrameConfig, encode_body};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::{ClientError, Result};

/// Cloneable handle that queues messages for the session's writer task.
///
/// Every frame of a connection is written by that one task, so sends from
/// any number of handlers or threads never interleave on the socket.
#[derive(Clone, Debug)]
pub struct Outbox {
    tx: mpsc::Sender<Bytes>,
    frame: FrameConfig,
}

impl Outbox {
    pub(crate) fn new(tx: mpsc::Sender<Bytes>, frame: FrameConfig) -> Self {
        Self { tx, frame }
    }

    /// Queue `message` without waiting.
    ///
    /// Fails with [`ClientError::OutboxFull`] when the queue is at capacity
    /// and with a framing error when the message is too large to frame.
    pub fn send(&self, message: &Message) -> Result<()> {
        let body = self.body(message)?;
        self.tx.try_send(body).map_err(|e| match e {
            TrySendError::Full(_) => ClientError::OutboxFull,
            TrySendError::Closed(_) => ClientError::Closed,
        })
    }

    /// Queue `message`, waiting for space if the queue is full.
    pub async fn send_async(&self, message: &Message) -> Result<()> {
        let body = self.body(message)?;
        self.tx.send(body).await.map_err(|_| ClientError::Closed)
    }

    /// Whether the writer task has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn body(&self, message: &Message) -> Result<Bytes> {
        let body = encode_body(message)?;
        self.frame.check_len(body.len())?;
        Ok(body)
    }
}

/// Drain `rx` into the socket until every sender is gone or `closing` fires.
///
/// On `closing`, whatever is already queued is still written before the
/// socket's write side is shut down.
pub(crate) async fn write_loop(
    mut rx: mpsc::Receiver<Bytes>,
    mut sink: FramedWrite<OwnedWriteHalf, FrameCodec>,
    closing: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => {
                let Some(body) = next else { break };
                if let Err(e) = sink.send(body).await {
                    warn!(error = %e, "write failed, stopping writer");
                    return;
                }
            }
            () = closing.cancelled() => {
                rx.close();
                while let Ok(body) = rx.try_recv() {
                    if let Err(e) = sink.feed(body).await {
                        warn!(error = %e, "write failed while flushing");
                        return;
                    }
                }
                break;
            }
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "socket close failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use swergio_core::MessageType;
    use swergio_wire::FrameError;

    fn text(room: &str) -> Message {
        Message::new(MessageType::Text, room)
    }

    #[tokio::test]
    async fn send_queues_serialized_body() {
        let (tx, mut rx) = mpsc::channel(4);
        let outbox = Outbox::new(tx, FrameConfig::default());
        let msg = text("galactic_chat");
        outbox.send(&msg).unwrap();
        let body = rx.recv().await.unwrap();
        assert_eq!(Message::from_json(&body).unwrap(), msg);
    }

    #[test]
    fn full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        let outbox = Outbox::new(tx, FrameConfig::default());
        outbox.send(&text("a")).unwrap();
        assert_matches!(outbox.send(&text("a")), Err(ClientError::OutboxFull));
    }

    #[test]
    fn closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let outbox = Outbox::new(tx, FrameConfig::default());
        assert!(outbox.is_closed());
        assert_matches!(outbox.send(&text("a")), Err(ClientError::Closed));
    }

    #[test]
    fn oversized_message_is_refused_before_queueing() {
        let (tx, mut rx) = mpsc::channel(1);
        let outbox = Outbox::new(
            tx,
            FrameConfig {
                header_len: 10,
                max_frame_len: 8,
            },
        );
        assert_matches!(
            outbox.send(&text("a")),
            Err(ClientError::Frame(FrameError::Oversized { .. }))
        );
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn send_async_waits_for_space() {
        let (tx, mut rx) = mpsc::channel(1);
        let outbox = Outbox::new(tx, FrameConfig::default());
        outbox.send(&text("a")).unwrap();

        let pending = {
            let outbox = outbox.clone();
            tokio::spawn(async move { outbox.send_async(&text("b")).await })
        };
        let _ = rx.recv().await.unwrap();
        pending.await.unwrap().unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(
            Message::from_json(&second).unwrap().to_room.unwrap().as_str(),
            "b"
        );
    }
}
