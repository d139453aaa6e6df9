//! Forward/gradient relay over a [`CorrelationStore`].
//!
//! A relay hop owns one stage of a computation split across components.
//! Its FORWARD handler runs the stage on the incoming `DATA`, remembers the
//! upstream message id under a freshly generated one, and forwards the result
//! downstream under that fresh id. Its GRADIENT handler receives the
//! downstream answer (addressed with the fresh id), resolves it back to the
//! upstream id, runs the backward stage, and answers upstream under the
//! upstream id. Each hop only knows its immediate predecessor, so chains of
//! any depth compose.

use std::sync::Arc;

use serde_json::Value;
use swergio_client::{HandlerContext, HandlerError, HandlerRegistration, HandlerResult, Reply};
use swergio_core::{Message, MessageId, MessageType, RoomName, Trigger};
use tracing::{debug, warn};

use crate::correlation::CorrelationStore;

/// Payload key carrying activations and gradients.
pub const DATA: &str = "DATA";

/// One stage of a split computation.
pub trait SplitComputation: Send + Sync {
    /// Compute this stage's output from `input`.
    fn forward(&self, input: &Value) -> Result<Value, HandlerError>;

    /// Gradient with respect to this stage's input, given the `input` the
    /// forward saw and the `gradient` of its output.
    fn backward(&self, input: Value, gradient: &Value) -> Result<Value, HandlerError>;
}

/// Rooms a relay hop listens on and answers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelayRoutes {
    /// FORWARD messages arrive here.
    pub forward_in: RoomName,
    /// FORWARD results go here.
    pub forward_out: RoomName,
    /// GRADIENT answers from downstream arrive here.
    pub gradient_in: RoomName,
    /// GRADIENT answers to upstream go here.
    pub gradient_out: RoomName,
}

/// Builds the two handlers of a relay hop.
pub struct RelayHandlers<C> {
    computation: Arc<C>,
    store: Arc<CorrelationStore>,
    routes: RelayRoutes,
}

impl<C: SplitComputation + 'static> RelayHandlers<C> {
    /// Relay `computation`, keeping pending forwards in `store`.
    pub fn new(computation: Arc<C>, store: Arc<CorrelationStore>, routes: RelayRoutes) -> Self {
        Self {
            computation,
            store,
            routes,
        }
    }

    /// The store holding this hop's pending forwards.
    pub fn store(&self) -> &Arc<CorrelationStore> {
        &self.store
    }

    /// FORWARD handler: `forward_in` → `forward_out`.
    pub fn forward_handler<S: 'static>(&self) -> HandlerRegistration<S> {
        let computation = Arc::clone(&self.computation);
        let store = Arc::clone(&self.store);
        HandlerRegistration::from_fn(
            Trigger::new(MessageType::Forward, self.routes.forward_in.clone()),
            move |msg: &Message, _: &HandlerContext<S>| relay_forward(computation.as_ref(), &store, msg),
        )
        .respond(MessageType::Forward, self.routes.forward_out.clone())
        .named(format!("relay-forward@{}", self.routes.forward_in))
    }

    /// GRADIENT handler: `gradient_in` → `gradient_out`.
    pub fn gradient_handler<S: 'static>(&self) -> HandlerRegistration<S> {
        let computation = Arc::clone(&self.computation);
        let store = Arc::clone(&self.store);
        HandlerRegistration::from_fn(
            Trigger::new(MessageType::Gradient, self.routes.gradient_in.clone()),
            move |msg: &Message, _: &HandlerContext<S>| relay_gradient(computation.as_ref(), &store, msg),
        )
        .respond(MessageType::Gradient, self.routes.gradient_out.clone())
        .named(format!("relay-gradient@{}", self.routes.gradient_in))
    }

    /// Both handlers, forward first.
    pub fn registrations<S: 'static>(&self) -> [HandlerRegistration<S>; 2] {
        [self.forward_handler(), self.gradient_handler()]
    }
}

fn data(msg: &Message) -> Result<&Value, HandlerError> {
    msg.get(DATA).ok_or_else(|| HandlerError::MissingField(DATA.into()))
}

/// Run the forward stage and remember where its answer must go.
pub fn relay_forward<C: SplitComputation + ?Sized>(
    computation: &C,
    store: &CorrelationStore,
    msg: &Message,
) -> HandlerResult {
    let input = data(msg)?;
    let output = computation.forward(input)?;
    let local = MessageId::new();
    store.remember(local.clone(), msg.id.clone(), input.clone());
    debug!(origin_id = %msg.id, local_id = %local, "forward relayed");
    Ok(Some(Reply::data(output).with_id(local)))
}

/// Resolve a downstream gradient and answer the upstream caller.
///
/// An id with no pending forward is logged and answered with nothing.
pub fn relay_gradient<C: SplitComputation + ?Sized>(
    computation: &C,
    store: &CorrelationStore,
    msg: &Message,
) -> HandlerResult {
    let gradient = data(msg)?;
    let Some(record) = store.resolve(&msg.id) else {
        warn!(message_id = %msg.id, "gradient for unknown forward, ignoring");
        return Ok(None);
    };
    let input_gradient = computation.backward(record.context, gradient)?;
    debug!(local_id = %msg.id, origin_id = %record.origin, "gradient relayed");
    Ok(Some(Reply::data(input_gradient).with_id(record.origin)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
