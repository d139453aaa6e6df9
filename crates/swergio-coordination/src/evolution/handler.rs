//! Barrier-driven evolution as a client handler.
//!
//! Participants report their genome as `{WEIGHTS: [..], COMPONENT_ID: id}`.
//! An evaluator reports fitness as `{CONTRIBUTION: {id: score, ..}}`. Once
//! every expected participant has both, one generation is produced and sent
//! back as `{CMD: "SET", WEIGHTS: {id: genome, ..}}`, and `{STATUS:
//! "EVO_DONE"}` goes to the notify room.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::{Value, json};
use swergio_client::{Handler, HandlerContext, HandlerError, HandlerRegistration, HandlerResult, Reply};
use swergio_core::{Message, MessageType, ParticipantId, Payload, RoomName, Trigger};
use tracing::{info, warn};

use super::{Evolution, Genome};
use crate::barrier::{Barrier, Snapshot};
use crate::errors::BarrierError;

/// Payload key of a participant's genome.
pub const WEIGHTS: &str = "WEIGHTS";
/// Payload key naming the reporting participant.
pub const COMPONENT_ID: &str = "COMPONENT_ID";
/// Payload key of a participant → fitness map.
pub const CONTRIBUTION: &str = "CONTRIBUTION";
/// Barrier sub-key collecting genomes.
pub const WEIGHTS_KEY: &str = "weights";
/// Barrier sub-key collecting fitness.
pub const FITNESS_KEY: &str = "fitness";
/// `STATUS` sent to the notify room after each generation.
pub const EVO_DONE: &str = "EVO_DONE";

/// Result of one completed round.
#[derive(Clone, Debug, PartialEq)]
pub struct StepOutcome {
    /// Barrier round that produced it.
    pub round: u64,
    /// Next generation, keyed by the participants of the round.
    pub weights: BTreeMap<ParticipantId, Genome>,
}

/// Collects genomes and fitness, and evolves once a round is complete.
pub struct EvolutionHandler {
    barrier: Barrier,
    evolution: Mutex<Evolution>,
    notify: Option<RoomName>,
}

impl EvolutionHandler {
    /// Handler waiting for `expected` participants per round.
    ///
    /// A participant counts once both its genome and its fitness arrived, so
    /// a fitness report for an unknown participant waits for that
    /// participant's genome instead of completing the round.
    pub fn new(expected: usize, evolution: Evolution) -> Result<Self, BarrierError> {
        Ok(Self {
            barrier: Barrier::new(expected, [WEIGHTS_KEY, FITNESS_KEY])?.aligned(),
            evolution: Mutex::new(evolution),
            notify: None,
        })
    }

    /// Announce each completed generation in `room`.
    #[must_use]
    pub fn notify(mut self, room: impl Into<RoomName>) -> Self {
        self.notify = Some(room.into());
        self
    }

    /// The round being collected.
    pub fn barrier(&self) -> &Barrier {
        &self.barrier
    }

    /// Generations produced so far.
    pub fn generation(&self) -> u64 {
        self.evolution.lock().generation()
    }

    /// Handle `DATA.CUSTOM` messages in `room` and answer there.
    pub fn registration<S: 'static>(self, room: impl Into<RoomName>) -> HandlerRegistration<S> {
        let room = room.into();
        HandlerRegistration::new(Trigger::new(MessageType::Custom, room.clone()), self)
            .respond(MessageType::Custom, room)
            .named("evolution")
    }

    /// Record whatever `msg` contributes and run a step if that completed
    /// the round.
    ///
    /// A malformed message is rejected whole, before anything is recorded.
    pub fn absorb(&self, msg: &Message) -> Result<Option<StepOutcome>, HandlerError> {
        let genome = match (msg.get(WEIGHTS), msg.get(COMPONENT_ID)) {
            (Some(weights), Some(id)) => {
                let id = id
                    .as_str()
                    .ok_or_else(|| HandlerError::invalid(COMPONENT_ID, "expected a string"))?;
                let _: Genome = serde_json::from_value(weights.clone())?;
                Some((id, weights.clone()))
            }
            _ => None,
        };
        let scores = match msg.get(CONTRIBUTION) {
            Some(Value::Object(entries)) => {
                if let Some((id, _)) = entries.iter().find(|(_, v)| !v.is_number()) {
                    return Err(HandlerError::invalid(CONTRIBUTION, format!("fitness of `{id}` is not a number")));
                }
                entries.iter().collect()
            }
            Some(_) => return Err(HandlerError::invalid(CONTRIBUTION, "expected an object")),
            None => Vec::new(),
        };

        let mut fired = None;
        if let Some((id, weights)) = genome {
            keep_first(&mut fired, self.barrier.contribute_and_take(WEIGHTS_KEY, id, weights)?);
        }
        for (id, score) in scores {
            keep_first(&mut fired, self.barrier.contribute_and_take(FITNESS_KEY, id.as_str(), score.clone())?);
        }

        fired.map(|snapshot| self.step(snapshot)).transpose()
    }

    fn step(&self, mut snapshot: Snapshot) -> Result<StepOutcome, HandlerError> {
        let weights = snapshot
            .take(WEIGHTS_KEY)
            .unwrap_or_default()
            .into_iter()
            .map(|(id, v)| -> Result<_, HandlerError> { Ok((id, serde_json::from_value::<Genome>(v)?)) })
            .collect::<Result<BTreeMap<_, _>, HandlerError>>()?;
        let fitness = snapshot
            .take(FITNESS_KEY)
            .unwrap_or_default()
            .into_iter()
            .map(|(id, v)| -> Result<_, HandlerError> {
                let score = v
                    .as_f64()
                    .ok_or_else(|| HandlerError::invalid(CONTRIBUTION, format!("fitness of `{id}` is not a number")))?;
                Ok((id, score))
            })
            .collect::<Result<BTreeMap<_, _>, HandlerError>>()?;

        let weights = self.evolution.lock().step(weights, &fitness)?;
        info!(round = snapshot.round, participants = weights.len(), "evolution step complete");
        Ok(StepOutcome {
            round: snapshot.round,
            weights,
        })
    }
}

fn keep_first(fired: &mut Option<Snapshot>, next: Option<Snapshot>) {
    let Some(next) = next else { return };
    if let Some(kept) = fired.as_ref() {
        warn!(
            kept = kept.round,
            dropped = next.round,
            "one message completed two rounds, dropping the later one"
        );
    } else {
        *fired = Some(next);
    }
}

impl<S> Handler<S> for EvolutionHandler {
    fn handle(&self, msg: &Message, _ctx: &HandlerContext<S>) -> HandlerResult {
        let Some(outcome) = self.absorb(msg)? else {
            return Ok(None);
        };
        let mut reply = Reply::new(Payload::new())
            .with_field("CMD", "SET")?
            .with_field(WEIGHTS, serde_json::to_value(&outcome.weights)?)?;
        if let Some(room) = &self.notify {
            let done = Message::new(MessageType::Custom, room.clone())
                .start_chain()
                .with_field("STATUS", EVO_DONE)?;
            reply = reply.also(done);
        }
        Ok(Some(reply))
    }
}

impl std::fmt::Debug for EvolutionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EvolutionHandler")
            .field("barrier", &self.barrier)
            .field("notify", &self.notify)
            .finish_non_exhaustive()
    }
}

/// Ask participants for their genomes when `{EVOLUTION: true}` arrives in
/// `control`; the request `{CMD: "GET"}` goes to `evolution`.
pub fn request_weights<S: 'static>(
    control: impl Into<RoomName>,
    evolution: impl Into<RoomName>,
) -> HandlerRegistration<S> {
    HandlerRegistration::from_fn(
        Trigger::new(MessageType::Custom, control),
        |msg: &Message, _: &HandlerContext<S>| {
            if msg.get("EVOLUTION") == Some(&json!(true)) {
                Ok(Some(Reply::new(Payload::new()).with_field("CMD", "GET")?))
            } else {
                Ok(None)
            }
        },
    )
    .respond(MessageType::Custom, evolution)
    .named("evolution-request")
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
