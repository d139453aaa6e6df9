//! `Client`: one component's session with the broker.

use std::any::Any;
use std::collections::BTreeSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{FutureExt, StreamExt};
use swergio_core::{Message, ParticipantId, RoomName};
use swergio_wire::{FrameCodec, FrameConfig};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::config::ClientConfig;
use crate::errors::{ClientError, Result};
use crate::handler::{HandlerContext, HandlerRegistration, StopHandle};
use crate::outbox::{Outbox, write_loop};

/// How long [`Client::close`] waits for queued frames to be written.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a non-blocking [`Client::try_receive`].
#[derive(Clone, Debug, PartialEq)]
pub enum Receive {
    /// A complete message was available.
    Message(Message),
    /// Nothing has arrived yet.
    Pending,
    /// The broker closed the connection.
    Closed,
}

/// Why [`Client::listen`] returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopExit {
    /// A stop was requested through a [`StopHandle`] or a handler.
    Stopped,
    /// The connection closed.
    Disconnected,
}

/// A component connected to the broker.
///
/// Owns the inbound half of the socket, the room memberships, the handler
/// registrations, and the shared state handed to every handler. Outbound
/// frames go through the [`Outbox`], drained by a dedicated writer task.
///
/// ```text
/// listen():  WAITING_FRAME ── frame ──▶ DECODED ──▶ DISPATCHING ──┐
///                 ▲                                                │
///                 └────────────────────────────────────────────────┘
///            WAITING_FRAME ── close / stop ──▶ STOPPED
/// ```
pub struct Client<S = ()> {
    name: ParticipantId,
    frames: FramedRead<OwnedReadHalf, FrameCodec>,
    rooms: BTreeSet<RoomName>,
    handlers: Vec<HandlerRegistration<S>>,
    ctx: HandlerContext<S>,
    stop: StopHandle,
    closing: CancellationToken,
    writer: JoinHandle<()>,
}

impl<S: Send + Sync + 'static> Client<S> {
    /// Connect to the broker. `state` is shared by every handler.
    pub async fn connect(config: ClientConfig, state: S) -> Result<Self> {
        Self::connect_shared(config, Arc::new(state)).await
    }

    /// Connect with state that is also held elsewhere.
    pub async fn connect_shared(config: ClientConfig, state: Arc<S>) -> Result<Self> {
        let connect = TcpStream::connect(&config.addr);
        let stream = tokio::time::timeout(config.connect_timeout, connect)
            .await
            .map_err(|_| ClientError::ConnectTimeout {
                addr: config.addr.clone(),
                timeout: config.connect_timeout,
            })?
            .map_err(|source| ClientError::Connect {
                addr: config.addr.clone(),
                source,
            })?;
        let _ = stream.set_nodelay(true);
        info!(client = %config.name, addr = %config.addr, "connected to broker");
        Ok(Self::from_stream(stream, config.name, config.frame, config.outbound_buffer, state))
    }

    /// Wrap an already connected socket.
    pub fn from_stream(
        stream: TcpStream,
        name: ParticipantId,
        frame: FrameConfig,
        outbound_buffer: usize,
        state: Arc<S>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (tx, rx) = mpsc::channel::<Bytes>(outbound_buffer.max(1));
        let closing = CancellationToken::new();
        let writer = tokio::spawn(write_loop(
            rx,
            FramedWrite::new(write_half, FrameCodec::new(frame)),
            closing.clone(),
        ));
        let stop = StopHandle::new();
        let outbox = Outbox::new(tx, frame);
        Self {
            ctx: HandlerContext::new(name.clone(), state, outbox, stop.clone()),
            name,
            frames: FramedRead::new(read_half, FrameCodec::new(frame)),
            rooms: BTreeSet::new(),
            handlers: Vec::new(),
            stop,
            closing,
            writer,
        }
    }
}

impl<S> Client<S> {
    /// Component name.
    pub fn name(&self) -> &ParticipantId {
        &self.name
    }

    /// Rooms joined so far.
    pub fn rooms(&self) -> impl Iterator<Item = &RoomName> {
        self.rooms.iter()
    }

    /// Number of registered handlers.
    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Shared handler state.
    pub fn state(&self) -> &S {
        self.ctx.state()
    }

    /// A cloneable handle for sending from other tasks.
    pub fn outbox(&self) -> Outbox {
        self.ctx.outbox().clone()
    }

    /// A handle that ends [`listen`](Self::listen) from elsewhere.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Queue `message` for sending.
    ///
    /// Fails with [`ClientError::OutboxFull`] instead of waiting; use
    /// [`send_async`](Self::send_async) to wait for space.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.ctx.send(message)
    }

    /// Queue `message`, waiting while the outbound queue is full.
    pub async fn send_async(&self, message: &Message) -> Result<()> {
        self.ctx.outbox().send_async(message).await
    }

    /// Join `room`. Returns `false` if already joined.
    pub fn join_room(&mut self, room: impl Into<RoomName>) -> Result<bool> {
        let room = room.into();
        if self.rooms.contains(&room) {
            return Ok(false);
        }
        self.ctx.send(&Message::join(room.clone()))?;
        debug!(client = %self.name, room = %room, "joined room");
        let _ = self.rooms.insert(room);
        Ok(true)
    }

    /// Leave `room`. Returns `false` if not joined.
    pub fn leave_room(&mut self, room: impl Into<RoomName>) -> Result<bool> {
        let room = room.into();
        if !self.rooms.contains(&room) {
            return Ok(false);
        }
        self.ctx.send(&Message::leave(room.clone()))?;
        debug!(client = %self.name, room = %room, "left room");
        let _ = self.rooms.remove(&room);
        Ok(true)
    }

    /// Register a handler, joining the trigger's room if it names one.
    pub fn add_handler(&mut self, registration: HandlerRegistration<S>) -> Result<()> {
        if let Some(room) = registration.trigger.room.clone() {
            let _ = self.join_room(room)?;
        }
        debug!(client = %self.name, handler = %registration.name, "handler added");
        self.handlers.push(registration);
        Ok(())
    }

    /// Next message, or `None` once the connection is closed.
    ///
    /// Frames whose body is not a valid message are skipped with a warning.
    /// A malformed header is fatal and returned as an error.
    pub async fn receive(&mut self) -> Result<Option<Message>> {
        loop {
            match self.frames.next().await {
                None => return Ok(None),
                Some(Ok(body)) => match Message::from_json(&body) {
                    Ok(message) => return Ok(Some(message)),
                    Err(e) => {
                        warn!(client = %self.name, error = %e, len = body.len(), "unparsable message, skipping");
                    }
                },
                Some(Err(e)) if e.is_disconnect() => {
                    debug!(client = %self.name, error = %e, "connection lost");
                    return Ok(None);
                }
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    /// Return a message only if one is already buffered; never waits.
    pub fn try_receive(&mut self) -> Result<Receive> {
        match self.receive().now_or_never() {
            None => Ok(Receive::Pending),
            Some(Ok(Some(message))) => Ok(Receive::Message(message)),
            Some(Ok(None)) => Ok(Receive::Closed),
            Some(Err(e)) => Err(e),
        }
    }

    /// Receive until `predicate` accepts a message. Others are discarded.
    ///
    /// Returns `None` if the connection closes first.
    pub async fn wait_for<P>(&mut self, mut predicate: P) -> Result<Option<Message>>
    where
        P: FnMut(&Message) -> bool,
    {
        while let Some(message) = self.receive().await? {
            if predicate(&message) {
                return Ok(Some(message));
            }
            debug!(client = %self.name, message_id = %message.id, "discarded while waiting");
        }
        Ok(None)
    }

    /// Run the receive/dispatch loop until the connection closes or a stop
    /// is requested.
    ///
    /// A handler error or panic is logged and the loop moves on to the next
    /// frame. Only a fatal framing fault ends the loop with an error.
    #[instrument(skip_all, fields(client = %self.name))]
    pub async fn listen(&mut self) -> Result<LoopExit> {
        let stop = self.stop.token().clone();
        info!(handlers = self.handlers.len(), rooms = self.rooms.len(), "listening");
        loop {
            if stop.is_cancelled() {
                info!("stopped");
                return Ok(LoopExit::Stopped);
            }
            let next = tokio::select! {
                biased;
                () = stop.cancelled() => continue,
                next = self.receive() => next?,
            };
            let Some(message) = next else {
                info!("broker closed the connection");
                return Ok(LoopExit::Disconnected);
            };
            let _ = self.dispatch(&message).await;
        }
    }

    /// Run every matching handler on `message` and send their replies.
    ///
    /// A reply waits for room in the outbound queue rather than being
    /// dropped, so a slow connection delays intake instead of losing output.
    /// Returns how many handlers matched.
    pub async fn dispatch(&self, message: &Message) -> usize {
        let mut matched = 0;
        for registration in &self.handlers {
            if !registration.trigger.matches(message) {
                continue;
            }
            matched += 1;

            let outcome = catch_unwind(AssertUnwindSafe(|| registration.invoke(message, &self.ctx)));
            let mut reply = match outcome {
                Ok(Ok(Some(reply))) => reply,
                Ok(Ok(None)) => continue,
                Ok(Err(e)) => {
                    warn!(handler = %registration.name, message_id = %message.id, error = %e, "handler failed");
                    continue;
                }
                Err(panic) => {
                    error!(
                        handler = %registration.name,
                        message_id = %message.id,
                        panic = panic_message(panic.as_ref()),
                        "handler panicked"
                    );
                    continue;
                }
            };

            let notices = std::mem::take(&mut reply.notices);
            for notice in &notices {
                if let Err(e) = self.ctx.outbox().send_async(notice).await {
                    warn!(handler = %registration.name, message_id = %notice.id, error = %e, "notice not sent");
                }
            }

            let Some(out) = registration.reply_message(message, reply) else {
                warn!(handler = %registration.name, "reply dropped, handler has no response route");
                continue;
            };
            match self.ctx.outbox().send_async(&out).await {
                Ok(()) => debug!(
                    handler = %registration.name,
                    message_id = %out.id,
                    room = ?out.to_room,
                    "reply sent"
                ),
                Err(e) => warn!(handler = %registration.name, error = %e, "reply not sent"),
            }
        }
        if matched == 0 {
            debug!(message_id = %message.id, kind = %message.kind, "no handler matched");
        }
        matched
    }

    /// Write every queued frame, then close the connection.
    pub async fn close(self) {
        self.closing.cancel();
        let name = self.name;
        drop(self.frames);
        drop(self.ctx);
        if tokio::time::timeout(CLOSE_TIMEOUT, self.writer).await.is_err() {
            warn!(client = %name, "timed out flushing outbound frames");
        } else {
            debug!(client = %name, "connection closed");
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandlerResult, Reply};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use swergio_core::logging::capture_logs;
    use swergio_core::{MessageId, MessageType, RootId, Trigger};
    use swergio_wire::decode;
    use tracing::Level;
    use tokio::net::TcpListener;

    /// Client wired straight to a test-held socket instead of a broker.
    async fn pair<S: Send + Sync + 'static>(state: S) -> (Client<S>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let config = ClientConfig::new("tester", addr.to_string());
        let (client, accepted) = tokio::join!(Client::connect(config, state), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    async fn read(peer: &mut TcpStream) -> Message {
        tokio::time::timeout(Duration::from_secs(5), decode(peer, &FrameConfig::default()))
            .await
            .unwrap()
            .unwrap()
    }

    async fn write(peer: &mut TcpStream, message: &Message) {
        swergio_wire::write_message(peer, &FrameConfig::default(), message)
            .await
            .unwrap();
    }

    fn echo(message: &Message, _ctx: &HandlerContext<()>) -> HandlerResult {
        Ok(Some(Reply::new(message.payload().clone())))
    }

    #[tokio::test]
    async fn add_handler_joins_trigger_room_once() {
        let (mut client, mut peer) = pair(()).await;
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::new(MessageType::Text, "galactic_chat"), echo))
            .unwrap();
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::new(MessageType::Custom, "galactic_chat"), echo))
            .unwrap();
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::on_type(MessageType::Gradient), echo))
            .unwrap();

        let join = read(&mut peer).await;
        assert_eq!(join.kind, MessageType::Join);
        assert_eq!(join.to_room.as_deref(), Some("galactic_chat"));
        assert_eq!(client.rooms().count(), 1);
        assert_eq!(client.handler_count(), 3);
    }

    #[tokio::test]
    async fn leave_room_sends_leave() {
        let (mut client, mut peer) = pair(()).await;
        assert!(client.join_room("control").unwrap());
        assert!(!client.join_room("control").unwrap());
        assert!(client.leave_room("control").unwrap());
        assert!(!client.leave_room("control").unwrap());

        assert_eq!(read(&mut peer).await.kind, MessageType::Join);
        assert_eq!(read(&mut peer).await.kind, MessageType::Leave);
        assert_eq!(client.rooms().count(), 0);
    }

    #[tokio::test]
    async fn dispatch_replies_with_route_and_root() {
        let (mut client, mut peer) = pair(()).await;
        client
            .add_handler(
                HandlerRegistration::from_fn(Trigger::new(MessageType::Forward, "in"), echo)
                    .respond(MessageType::Forward, "out"),
            )
            .unwrap();
        let _join = read(&mut peer).await;

        let input = Message::new(MessageType::Forward, "in")
            .with_root(RootId::from("chain-7"))
            .with_field("DATA", json!([1, 2, 3]))
            .unwrap();
        assert_eq!(client.dispatch(&input).await, 1);

        let out = read(&mut peer).await;
        assert_eq!(out.kind, MessageType::Forward);
        assert_eq!(out.to_room.as_deref(), Some("out"));
        assert_eq!(out.root_id.as_ref().map(RootId::as_str), Some("chain-7"));
        assert_ne!(out.id, input.id);
        assert_eq!(out.get("DATA"), Some(&json!([1, 2, 3])));
    }

    #[tokio::test]
    async fn every_matching_handler_runs() {
        let (mut client, _peer) = pair(AtomicUsize::new(0)).await;
        for trigger in [
            Trigger::new(MessageType::Text, "r"),
            Trigger::in_room("r"),
            Trigger::on_type(MessageType::Text),
            Trigger::on_type(MessageType::Custom),
        ] {
            client
                .add_handler(HandlerRegistration::from_fn(trigger, |_, ctx: &HandlerContext<AtomicUsize>| {
                    let _ = ctx.state().fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }))
                .unwrap();
        }
        assert_eq!(client.dispatch(&Message::new(MessageType::Text, "r")).await, 3);
        assert_eq!(client.state().load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failing_and_panicking_handlers_are_isolated() {
        let (logs, _guard) = capture_logs();
        let (mut client, mut peer) = pair(()).await;
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::in_room("r"), |_, _| {
                Err(crate::HandlerError::failed("nope"))
            }))
            .unwrap();
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::in_room("r"), |_, _| panic!("handler bug")))
            .unwrap();
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::in_room("r"), echo).respond(MessageType::Text, "r2"))
            .unwrap();
        let _join = read(&mut peer).await;

        let msg = Message::new(MessageType::Text, "r").with_field("DATA", "x").unwrap();
        assert_eq!(client.dispatch(&msg).await, 3);
        let out = read(&mut peer).await;
        assert_eq!(out.to_room.as_deref(), Some("r2"));

        assert!(logs.has_event(Level::WARN, "handler failed"));
        assert!(logs.has_event(Level::ERROR, "handler panicked"));
        assert!(logs.has_field("panic", "handler bug"));
        assert!(logs.has_field("message_id", msg.id.as_str()));
    }

    #[tokio::test]
    async fn replies_wait_for_a_full_outbox() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (stream, accepted) = tokio::join!(TcpStream::connect(listener.local_addr().unwrap()), listener.accept());
        let mut peer = accepted.unwrap().0;
        let mut client = Client::from_stream(
            stream.unwrap(),
            ParticipantId::from("tight"),
            FrameConfig::default(),
            1,
            Arc::new(()),
        );
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::on_type(MessageType::Text), echo).respond(MessageType::Text, "out"))
            .unwrap();

        for seq in 0..200 {
            let msg = Message::new(MessageType::Text, "in").with_field("SEQ", seq).unwrap();
            assert_eq!(client.dispatch(&msg).await, 1);
        }
        for seq in 0..200 {
            assert_eq!(read(&mut peer).await.get("SEQ"), Some(&json!(seq)));
        }
    }

    #[tokio::test]
    async fn notices_go_out_before_the_reply() {
        let (mut client, mut peer) = pair(()).await;
        client
            .add_handler(
                HandlerRegistration::from_fn(Trigger::on_type(MessageType::Custom), |_, _| {
                    let notice = Message::new(MessageType::Custom, "control").with_field("STATUS", "EVO_DONE")?;
                    Ok(Some(Reply::data("set").also(notice)))
                })
                .respond(MessageType::Custom, "evolution"),
            )
            .unwrap();
        let _ = client.dispatch(&Message::new(MessageType::Custom, "evolution")).await;

        let first = read(&mut peer).await;
        assert_eq!(first.to_room.as_deref(), Some("control"));
        assert_eq!(first.get("STATUS"), Some(&json!("EVO_DONE")));
        let second = read(&mut peer).await;
        assert_eq!(second.to_room.as_deref(), Some("evolution"));
        assert_eq!(second.get("DATA"), Some(&json!("set")));
    }

    #[tokio::test]
    async fn pinned_reply_id() {
        let (mut client, mut peer) = pair(()).await;
        client
            .add_handler(
                HandlerRegistration::from_fn(Trigger::on_type(MessageType::Gradient), |_, _| {
                    Ok(Some(Reply::data(0.5).with_id(MessageId::from("upstream"))))
                })
                .respond(MessageType::Gradient, "back"),
            )
            .unwrap();
        let _ = client.dispatch(&Message::new(MessageType::Gradient, "any")).await;
        assert_eq!(read(&mut peer).await.id.as_str(), "upstream");
    }

    #[tokio::test]
    async fn try_receive_pending_then_message_then_closed() {
        let (mut client, mut peer) = pair(()).await;
        assert_eq!(client.try_receive().unwrap(), Receive::Pending);

        let msg = Message::new(MessageType::Custom, "control")
            .with_field("STATUS", "EVO_DONE")
            .unwrap();
        write(&mut peer, &msg).await;

        let got = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match client.try_receive().unwrap() {
                    Receive::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
                    other => break other,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(got, Receive::Message(msg));

        drop(peer);
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match client.try_receive().unwrap() {
                    Receive::Pending => tokio::time::sleep(Duration::from_millis(5)).await,
                    other => break other,
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(closed, Receive::Closed);
    }

    #[tokio::test]
    async fn wait_for_discards_non_matching() {
        let (mut client, mut peer) = pair(()).await;
        write(&mut peer, &Message::new(MessageType::Text, "control")).await;
        let done = Message::new(MessageType::Custom, "control")
            .with_field("STATUS", "EVO_DONE")
            .unwrap();
        write(&mut peer, &done).await;

        let got = client
            .wait_for(|m| m.get("STATUS") == Some(&json!("EVO_DONE")))
            .await
            .unwrap();
        assert_eq!(got, Some(done));
    }

    #[tokio::test]
    async fn receive_skips_unparsable_bodies() {
        use tokio::io::AsyncWriteExt;
        let (mut client, mut peer) = pair(()).await;
        peer.write_all(b"3         [1]").await.unwrap();
        let ok = Message::new(MessageType::Text, "r");
        write(&mut peer, &ok).await;
        assert_eq!(client.receive().await.unwrap(), Some(ok));
    }

    #[tokio::test]
    async fn receive_fails_on_bad_header() {
        use tokio::io::AsyncWriteExt;
        let (mut client, mut peer) = pair(()).await;
        peer.write_all(b"xxxxxxxxxx").await.unwrap();
        let err = client.receive().await.unwrap_err();
        assert!(matches!(err, ClientError::Frame(ref f) if f.is_framing()), "{err}");
    }

    #[tokio::test]
    async fn listen_ends_on_disconnect() {
        let (mut client, peer) = pair(()).await;
        drop(peer);
        assert_eq!(client.listen().await.unwrap(), LoopExit::Disconnected);
    }

    #[tokio::test]
    async fn handler_can_stop_the_loop() {
        let (mut client, mut peer) = pair(()).await;
        client
            .add_handler(HandlerRegistration::from_fn(Trigger::in_room("control"), |m, ctx| {
                if m.get("CMD") == Some(&json!("STOP")) {
                    ctx.stop();
                }
                Ok(None)
            }))
            .unwrap();
        let _join = read(&mut peer).await;
        write(&mut peer, &Message::new(MessageType::Custom, "control").with_field("CMD", "STOP").unwrap()).await;

        let exit = tokio::time::timeout(Duration::from_secs(5), client.listen()).await.unwrap();
        assert_eq!(exit.unwrap(), LoopExit::Stopped);
    }

    #[tokio::test]
    async fn stop_handle_ends_idle_loop() {
        let (mut client, _peer) = pair(()).await;
        let stop = client.stop_handle();
        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stop.stop();
        });
        let exit = tokio::time::timeout(Duration::from_secs(5), client.listen()).await.unwrap();
        assert_eq!(exit.unwrap(), LoopExit::Stopped);
        stopper.await.unwrap();
    }

    #[tokio::test]
    async fn close_flushes_queue() {
        let (client, mut peer) = pair(()).await;
        for i in 0..20 {
            client
                .send(&Message::new(MessageType::Text, "r").with_field("N", i).unwrap())
                .unwrap();
        }
        client.close().await;
        for i in 0..20 {
            assert_eq!(read(&mut peer).await.get("N"), Some(&json!(i)));
        }
        assert!(matches!(
            decode(&mut peer, &FrameConfig::default()).await,
            Err(swergio_wire::FrameError::Closed)
        ));
    }

    #[test]
    fn panic_messages() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");
        let other: Box<dyn Any + Send> = Box::new(5_u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }
}
