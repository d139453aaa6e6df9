//! Pending-relay bookkeeping.
//!
//! A relay hop that forwards a computation downstream remembers which
//! upstream message it is working for. When the downstream answer comes
//! back under the id the hop generated, [`CorrelationStore::resolve`] hands
//! back the upstream id (so the hop can answer its own caller) together with
//! whatever context the backward step needs.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde_json::Value;
use swergio_core::MessageId;
use tracing::debug;

/// What a hop needs to finish the backward step for one forward.
#[derive(Clone, Debug, PartialEq)]
pub struct CorrelationRecord {
    /// Id of the upstream message this forward answers.
    pub origin: MessageId,
    /// Opaque data kept for the backward step.
    pub context: Value,
}

/// Map from a hop's locally generated id to its [`CorrelationRecord`].
///
/// Records have no expiry: a forward whose answer never arrives stays
/// pending until the process exits.
#[derive(Debug, Default)]
pub struct CorrelationStore {
    pending: Mutex<HashMap<MessageId, CorrelationRecord>>,
}

impl CorrelationStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the forward sent as `local` works for `origin`.
    ///
    /// An unresolved record under the same `local` id is replaced.
    pub fn remember(&self, local: MessageId, origin: MessageId, context: Value) {
        let mut pending = self.pending.lock();
        if let Some(old) = pending.insert(local.clone(), CorrelationRecord { origin, context }) {
            debug!(local_id = %local, origin_id = %old.origin, "replaced pending correlation");
        }
    }

    /// Take the record for `local`, if one is pending.
    ///
    /// Look-up and removal happen under one lock, so two answers carrying the
    /// same id resolve at most once.
    pub fn resolve(&self, local: &MessageId) -> Option<CorrelationRecord> {
        self.pending.lock().remove(local)
    }

    /// Whether a record for `local` is pending.
    pub fn contains(&self, local: &MessageId) -> bool {
        self.pending.lock().contains_key(local)
    }

    /// Number of pending records.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Whether nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
