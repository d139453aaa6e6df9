//! Barrier rounds over per-participant contributions.
//!
//! A [`Barrier`] tracks a fixed set of sub-keys (for example `weights` and
//! `fitness`). Each participant contributes one value per sub-key. The round
//! is ready once every sub-key holds exactly `expected` participants; taking
//! the round empties every sub-key and starts the next one.
//!
//! An [aligned](Barrier::aligned) barrier instead counts participants that
//! have contributed to every sub-key. The round fires once exactly
//! `expected` of them are complete, and only their entries are taken;
//! contributions from anyone else stay for the next round.
//!
//! ```text
//! contribute("weights", p1, ..)  ──┐
//! contribute("weights", p2, ..)    ├─▶ is_ready() ──▶ drain_and_reset() ──▶ Snapshot
//! contribute("fitness", p1, ..)    │                         │
//! contribute("fitness", p2, ..)  ──┘                         └─▶ empty, round + 1
//! ```

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde_json::Value;
use swergio_core::ParticipantId;
use tracing::{debug, info};

use crate::errors::BarrierError;

/// Contributions of one sub-key, ordered by participant id.
pub type Contributions<V> = BTreeMap<ParticipantId, V>;

/// Everything collected in one completed round.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot<V = Value> {
    /// Round number, starting at 0.
    pub round: u64,
    entries: BTreeMap<String, Contributions<V>>,
}

impl<V> Snapshot<V> {
    /// Contributions under `sub_key`.
    pub fn get(&self, sub_key: &str) -> Option<&Contributions<V>> {
        self.entries.get(sub_key)
    }

    /// Take the contributions under `sub_key` out of the snapshot.
    pub fn take(&mut self, sub_key: &str) -> Option<Contributions<V>> {
        self.entries.remove(sub_key)
    }

    /// Participant ids of `sub_key`, in order.
    pub fn participants(&self, sub_key: &str) -> Vec<ParticipantId> {
        self.get(sub_key).map(|c| c.keys().cloned().collect()).unwrap_or_default()
    }

    /// All sub-keys and their contributions.
    pub fn into_entries(self) -> BTreeMap<String, Contributions<V>> {
        self.entries
    }
}

struct Round<V> {
    number: u64,
    aligned: bool,
    entries: BTreeMap<String, Contributions<V>>,
}

impl<V> Round<V> {
    fn is_ready(&self, expected: usize) -> bool {
        if self.aligned {
            self.complete().len() == expected
        } else {
            self.entries.values().all(|c| c.len() == expected)
        }
    }

    /// Participants present under every sub-key.
    fn complete(&self) -> Vec<ParticipantId> {
        let mut sub_keys = self.entries.values();
        let Some(first) = sub_keys.next() else {
            return Vec::new();
        };
        let rest: Vec<_> = sub_keys.collect();
        first
            .keys()
            .filter(|id| rest.iter().all(|c| c.contains_key(*id)))
            .cloned()
            .collect()
    }

    fn take(&mut self) -> Snapshot<V> {
        let entries = if self.aligned {
            let complete = self.complete();
            self.entries
                .iter_mut()
                .map(|(k, c)| {
                    let taken = complete.iter().filter_map(|id| c.remove_entry(id)).collect();
                    (k.clone(), taken)
                })
                .collect()
        } else {
            self.entries
                .iter_mut()
                .map(|(k, c)| (k.clone(), std::mem::take(c)))
                .collect()
        };
        let snapshot = Snapshot {
            round: self.number,
            entries,
        };
        self.number += 1;
        snapshot
    }

    fn leftover(&self) -> usize {
        self.entries.values().map(BTreeMap::len).sum()
    }
}

/// Gate that fires once every tracked sub-key has `expected` contributions.
///
/// Readiness is exact: a round with more than `expected` distinct
/// participants under a sub-key never fires. Contributions arriving after a
/// round fired count toward the next round.
pub struct Barrier<V = Value> {
    expected: usize,
    round: Mutex<Round<V>>,
}

impl<V> Barrier<V> {
    /// Barrier over `sub_keys`, each needing `expected` participants.
    pub fn new<I, K>(expected: usize, sub_keys: I) -> Result<Self, BarrierError>
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        if expected == 0 {
            return Err(BarrierError::ZeroParticipants);
        }
        let entries: BTreeMap<_, _> = sub_keys.into_iter().map(|k| (k.into(), BTreeMap::new())).collect();
        if entries.is_empty() {
            return Err(BarrierError::NoSubKeys);
        }
        Ok(Self {
            expected,
            round: Mutex::new(Round {
                number: 0,
                aligned: false,
                entries,
            }),
        })
    }

    /// Only fire for participants that contributed to every sub-key.
    ///
    /// Contributions from participants missing a sub-key are carried into
    /// the next round instead of being taken with the current one.
    #[must_use]
    pub fn aligned(self) -> Self {
        self.round.lock().aligned = true;
        self
    }

    /// Participants needed per sub-key.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Number of the round currently being collected.
    pub fn round(&self) -> u64 {
        self.round.lock().number
    }

    /// Record `value` for `participant` under `sub_key`, replacing any earlier
    /// value from the same participant this round.
    pub fn contribute(
        &self,
        sub_key: &str,
        participant: impl Into<ParticipantId>,
        value: V,
    ) -> Result<(), BarrierError> {
        let mut round = self.round.lock();
        Self::insert(&mut round, sub_key, participant.into(), value)
    }

    /// Whether every sub-key holds exactly [`expected`](Self::expected)
    /// participants, or for an aligned barrier, whether exactly `expected`
    /// participants have contributed to every sub-key.
    pub fn is_ready(&self) -> bool {
        self.round.lock().is_ready(self.expected)
    }

    /// Contributions so far under `sub_key`.
    pub fn pending(&self, sub_key: &str) -> Option<usize> {
        self.round.lock().entries.get(sub_key).map(BTreeMap::len)
    }

    /// Take the round if it is ready and start the next one.
    pub fn drain_and_reset(&self) -> Option<Snapshot<V>> {
        let mut round = self.round.lock();
        if !round.is_ready(self.expected) {
            return None;
        }
        let snapshot = round.take();
        info!(
            round = snapshot.round,
            expected = self.expected,
            carried = round.leftover(),
            "barrier round complete"
        );
        Some(snapshot)
    }

    /// Contribute and, if that completed the round, take it, all under one
    /// lock. Exactly one caller receives each round.
    pub fn contribute_and_take(
        &self,
        sub_key: &str,
        participant: impl Into<ParticipantId>,
        value: V,
    ) -> Result<Option<Snapshot<V>>, BarrierError> {
        let mut round = self.round.lock();
        Self::insert(&mut round, sub_key, participant.into(), value)?;
        if !round.is_ready(self.expected) {
            return Ok(None);
        }
        let snapshot = round.take();
        info!(
            round = snapshot.round,
            expected = self.expected,
            carried = round.leftover(),
            "barrier round complete"
        );
        Ok(Some(snapshot))
    }

    fn insert(round: &mut Round<V>, sub_key: &str, participant: ParticipantId, value: V) -> Result<(), BarrierError> {
        let contributions = round
            .entries
            .get_mut(sub_key)
            .ok_or_else(|| BarrierError::UnknownSubKey(sub_key.to_owned()))?;
        debug!(round = round.number, sub_key, participant = %participant, "contribution");
        let _ = contributions.insert(participant, value);
        Ok(())
    }
}

impl<V> std::fmt::Debug for Barrier<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let round = self.round.lock();
        let pending: BTreeMap<&str, usize> = round.entries.iter().map(|(k, c)| (k.as_str(), c.len())).collect();
        f.debug_struct("Barrier")
            .field("expected", &self.expected)
            .field("aligned", &round.aligned)
            .field("round", &round.number)
            .field("pending", &pending)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
