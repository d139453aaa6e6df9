//! Handlers and their registrations.
//!
//! A [`HandlerRegistration`] binds a [`Trigger`] to a [`Handler`] and,
//! optionally, a [`Response`] route. When an incoming message matches the
//! trigger, the handler runs with the message and the session's
//! [`HandlerContext`]. A returned [`Reply`] is wrapped into a new message
//! (fresh id unless the reply pins one, inherited `ROOT_ID`, the route's type
//! and room) and sent through the same session.

use std::sync::Arc;

use serde_json::Value;
use swergio_core::{CoreError, Message, MessageId, MessageType, ParticipantId, Payload, RoomName, Trigger};
use tokio_util::sync::CancellationToken;

use crate::errors::{HandlerError, Result};
use crate::outbox::Outbox;

/// What a handler returns.
pub type HandlerResult = std::result::Result<Option<Reply>, HandlerError>;

/// Payload of the message a handler wants sent in answer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reply {
    /// Pin the outgoing message id. `None` generates a fresh one.
    pub id: Option<MessageId>,
    /// Application data of the outgoing message.
    pub payload: Payload,
    /// Complete messages sent ahead of the reply, addressed as they are.
    pub notices: Vec<Message>,
}

impl Reply {
    /// Reply carrying `payload` under a fresh id.
    pub fn new(payload: Payload) -> Self {
        Self {
            id: None,
            payload,
            notices: Vec::new(),
        }
    }

    /// Reply with a single `DATA` field.
    pub fn data(value: impl Into<Value>) -> Self {
        let mut payload = Payload::new();
        // DATA is not a reserved key, so this cannot fail
        let _ = payload.insert("DATA", value);
        Self::new(payload)
    }

    /// Parse a JSON object. An `ID` string pins the outgoing id; the other
    /// reserved keys are refused.
    pub fn from_value(value: Value) -> std::result::Result<Self, CoreError> {
        let Value::Object(mut map) = value else {
            return Payload::from_value(value).map(Self::new);
        };
        let id = match map.remove("ID") {
            Some(Value::String(s)) => Some(MessageId::from(s)),
            Some(_) => return Err(CoreError::ReservedKey("ID".into())),
            None => None,
        };
        Ok(Self {
            id,
            payload: Payload::from_map(map)?,
            notices: Vec::new(),
        })
    }

    /// Pin the outgoing message id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = Some(id);
        self
    }

    /// Send `message` before the reply itself, through the same queue.
    #[must_use]
    pub fn also(mut self, message: Message) -> Self {
        self.notices.push(message);
        self
    }

    /// Add one payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> std::result::Result<Self, CoreError> {
        let _ = self.payload.insert(key, value)?;
        Ok(self)
    }
}

/// Where replies of a registration go.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// Type of the reply message.
    pub kind: MessageType,
    /// Room the reply is addressed to.
    pub room: RoomName,
}

impl Response {
    /// Reply route.
    pub fn new(kind: MessageType, room: impl Into<RoomName>) -> Self {
        Self {
            kind,
            room: room.into(),
        }
    }
}

/// Stops a session's `listen` loop.
#[derive(Clone, Debug, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop after the message currently being dispatched.
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Everything a handler can reach besides the message itself.
///
/// `state` is the session's shared object, the same instance for every
/// handler of the session; handlers coordinate through it (use interior
/// mutability for fields they change).
pub struct HandlerContext<S> {
    client: ParticipantId,
    state: Arc<S>,
    outbox: Outbox,
    stop: StopHandle,
}

impl<S> HandlerContext<S> {
    pub(crate) fn new(client: ParticipantId, state: Arc<S>, outbox: Outbox, stop: StopHandle) -> Self {
        Self {
            client,
            state,
            outbox,
            stop,
        }
    }

    /// Name of the owning session.
    pub fn client(&self) -> &ParticipantId {
        &self.client
    }

    /// Shared session state.
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Shared session state, as an owned handle.
    pub fn state_arc(&self) -> Arc<S> {
        Arc::clone(&self.state)
    }

    /// The session's outbound queue.
    pub fn outbox(&self) -> &Outbox {
        &self.outbox
    }

    /// Send an additional message, independent of the handler's reply.
    ///
    /// Never waits: a full queue fails with `OutboxFull`. Messages that must
    /// not be lost belong in [`Reply::also`], which the session sends with
    /// backpressure.
    pub fn send(&self, message: &Message) -> Result<()> {
        self.outbox.send(message)
    }

    /// End the session loop once this dispatch finishes.
    pub fn stop(&self) {
        self.stop.stop();
    }
}

/// Code run for messages matching a registration's trigger.
///
/// Handlers run synchronously inside the dispatch loop; no further frame is
/// read until they return.
pub trait Handler<S>: Send + Sync {
    /// Process one message.
    fn handle(&self, message: &Message, ctx: &HandlerContext<S>) -> HandlerResult;
}

struct FnHandler<F>(F);

impl<S, F> Handler<S> for FnHandler<F>
where
    F: Fn(&Message, &HandlerContext<S>) -> HandlerResult + Send + Sync,
{
    fn handle(&self, message: &Message, ctx: &HandlerContext<S>) -> HandlerResult {
        (self.0)(message, ctx)
    }
}

/// A trigger, the handler it selects, and where replies go.
pub struct HandlerRegistration<S> {
    /// Handler name, used in logs.
    pub name: String,
    /// Which messages the handler sees.
    pub trigger: Trigger,
    /// Reply route. Replies from a registration without one are dropped.
    pub response: Option<Response>,
    handler: Arc<dyn Handler<S>>,
}

impl<S: 'static> HandlerRegistration<S> {
    /// Register a [`Handler`] implementation.
    pub fn new(trigger: Trigger, handler: impl Handler<S> + 'static) -> Self {
        Self {
            name: trigger.to_string(),
            trigger,
            response: None,
            handler: Arc::new(handler),
        }
    }

    /// Register a closure.
    pub fn from_fn<F>(trigger: Trigger, f: F) -> Self
    where
        F: Fn(&Message, &HandlerContext<S>) -> HandlerResult + Send + Sync + 'static,
    {
        Self::new(trigger, FnHandler(f))
    }
}

impl<S> HandlerRegistration<S> {
    /// Send replies as `kind` messages to `room`.
    #[must_use]
    pub fn respond(mut self, kind: MessageType, room: impl Into<RoomName>) -> Self {
        self.response = Some(Response::new(kind, room));
        self
    }

    /// Name used in logs (defaults to the trigger).
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Run the handler.
    pub fn invoke(&self, message: &Message, ctx: &HandlerContext<S>) -> HandlerResult {
        self.handler.handle(message, ctx)
    }

    /// Turn a reply into the message to send: fresh or pinned id, inherited
    /// `ROOT_ID`, this registration's type and room.
    ///
    /// Returns `None` when the registration has no response route.
    pub fn reply_message(&self, input: &Message, reply: Reply) -> Option<Message> {
        let Response { kind, room } = self.response.as_ref()?;
        let out = input.derive_reply(kind.clone(), room.clone(), reply.payload);
        Some(match reply.id {
            Some(id) => out.with_id(id),
            None => out,
        })
    }
}

impl<S> std::fmt::Debug for HandlerRegistration<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistration")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}
