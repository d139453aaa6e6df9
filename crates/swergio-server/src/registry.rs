//! Room membership tables and fan-out routing.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use metrics::counter;
use parking_lot::RwLock;
use swergio_core::{ConnectionId, RoomName};
use tracing::{debug, warn};

use crate::connection::BrokerConnection;
use crate::metrics::{FRAMES_DROPPED_TOTAL, FRAMES_ROUTED_TOTAL, ROUTING_MISS_TOTAL};

/// Outcome of routing one frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    /// Members whose queue accepted the frame.
    pub delivered: usize,
    /// Members that were closing when the frame arrived.
    pub dropped: usize,
}

impl RouteOutcome {
    /// No member other than the sender was in the room.
    pub fn is_miss(&self) -> bool {
        self.delivered == 0 && self.dropped == 0
    }
}

#[derive(Default)]
struct Tables {
    connections: HashMap<ConnectionId, Arc<BrokerConnection>>,
    rooms: HashMap<RoomName, HashSet<ConnectionId>>,
    memberships: HashMap<ConnectionId, HashSet<RoomName>>,
}

/// Which connections are in which rooms.
///
/// All mutation happens under one write lock. [`route`](Self::route) copies
/// the member list under a read lock and enqueues outside it, so a join or
/// leave racing a fan-out sees either the old or the new member set, never a
/// partial one.
#[derive(Default)]
pub struct RoomRegistry {
    tables: RwLock<Tables>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly accepted connection. It belongs to no room yet.
    pub fn register(&self, connection: Arc<BrokerConnection>) {
        let mut t = self.tables.write();
        let id = connection.id.clone();
        let _ = t.memberships.entry(id.clone()).or_default();
        let _ = t.connections.insert(id, connection);
    }

    /// Add `conn` to `room`. Idempotent.
    ///
    /// Returns `true` if the membership is new, `false` if `conn` was already
    /// a member or is not registered.
    pub fn join(&self, conn: &ConnectionId, room: &RoomName) -> bool {
        let mut t = self.tables.write();
        if !t.connections.contains_key(conn) {
            warn!(conn_id = %conn, room = %room, "join from unregistered connection");
            return false;
        }
        let added = t.rooms.entry(room.clone()).or_default().insert(conn.clone());
        if added {
            let _ = t.memberships.entry(conn.clone()).or_default().insert(room.clone());
        }
        added
    }

    /// Remove `conn` from `room`. Empty rooms are forgotten.
    ///
    /// Returns `true` if `conn` was a member.
    pub fn leave(&self, conn: &ConnectionId, room: &RoomName) -> bool {
        let mut t = self.tables.write();
        let removed = match t.rooms.get_mut(room) {
            Some(members) => members.remove(conn),
            None => false,
        };
        if removed {
            if t.rooms.get(room).is_some_and(HashSet::is_empty) {
                let _ = t.rooms.remove(room);
            }
            if let Some(rooms) = t.memberships.get_mut(conn) {
                let _ = rooms.remove(room);
            }
        }
        removed
    }

    /// Forget `conn` and remove it from every room it belonged to.
    ///
    /// Returns the rooms it left, sorted.
    pub fn disconnect(&self, conn: &ConnectionId) -> Vec<RoomName> {
        let mut t = self.tables.write();
        let _ = t.connections.remove(conn);
        let rooms = t.memberships.remove(conn).unwrap_or_default();
        for room in &rooms {
            let now_empty = match t.rooms.get_mut(room) {
                Some(members) => {
                    let _ = members.remove(conn);
                    members.is_empty()
                }
                None => false,
            };
            if now_empty {
                let _ = t.rooms.remove(room);
            }
        }
        let mut left: Vec<RoomName> = rooms.into_iter().collect();
        left.sort();
        left
    }

    /// Enqueue `frame` for every member of `room` except `sender`.
    ///
    /// The bytes are forwarded unmodified and every open member receives
    /// them, however far behind its writer is. A room with no other member
    /// is a routing miss: logged at debug level, counted, and otherwise
    /// ignored.
    pub fn route(&self, sender: &ConnectionId, room: &RoomName, frame: &Bytes) -> RouteOutcome {
        let recipients: Vec<Arc<BrokerConnection>> = {
            let t = self.tables.read();
            t.rooms
                .get(room)
                .into_iter()
                .flatten()
                .filter(|id| *id != sender)
                .filter_map(|id| t.connections.get(id).cloned())
                .collect()
        };

        let mut outcome = RouteOutcome::default();
        for member in &recipients {
            if member.send(frame.clone()) {
                outcome.delivered += 1;
            } else {
                outcome.dropped += 1;
                warn!(
                    conn_id = %member.id,
                    room = %room,
                    dropped_total = member.drop_count(),
                    "member is closing, frame dropped"
                );
            }
        }

        if outcome.is_miss() {
            debug!(conn_id = %sender, room = %room, "no recipients, frame dropped");
            counter!(ROUTING_MISS_TOTAL).increment(1);
        } else {
            counter!(FRAMES_ROUTED_TOTAL).increment(outcome.delivered as u64);
            if outcome.dropped > 0 {
                counter!(FRAMES_DROPPED_TOTAL).increment(outcome.dropped as u64);
            }
            debug!(
                conn_id = %sender,
                room = %room,
                delivered = outcome.delivered,
                dropped = outcome.dropped,
                "frame routed"
            );
        }
        outcome
    }

    /// Members of `room`, sorted.
    pub fn room_members(&self, room: &RoomName) -> Vec<ConnectionId> {
        let t = self.tables.read();
        let mut members: Vec<ConnectionId> =
            t.rooms.get(room).into_iter().flatten().cloned().collect();
        members.sort();
        members
    }

    /// Rooms `conn` currently belongs to, sorted.
    pub fn rooms_of(&self, conn: &ConnectionId) -> Vec<RoomName> {
        let t = self.tables.read();
        let mut rooms: Vec<RoomName> = t.memberships.get(conn).into_iter().flatten().cloned().collect();
        rooms.sort();
        rooms
    }

    /// Registered connections.
    pub fn connection_count(&self) -> usize {
        self.tables.read().connections.len()
    }

    /// Rooms with at least one member.
    pub fn room_count(&self) -> usize {
        self.tables.read().rooms.len()
    }

    /// Look up a registered connection.
    pub fn connection(&self, conn: &ConnectionId) -> Option<Arc<BrokerConnection>> {
        self.tables.read().connections.get(conn).cloned()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn make_connection(id: &str) -> (Arc<BrokerConnection>, mpsc::UnboundedReceiver<Bytes>) {
        make_connection_with_high_water(id, 32)
    }

    fn make_connection_with_high_water(
        id: &str,
        high_water: usize,
    ) -> (Arc<BrokerConnection>, mpsc::UnboundedReceiver<Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = "127.0.0.1:50000".parse().unwrap();
        (Arc::new(BrokerConnection::new(ConnectionId::from(id), peer, tx, high_water)), rx)
    }

    fn room(name: &str) -> RoomName {
        RoomName::from(name)
    }

    fn frame() -> Bytes {
        Bytes::from_static(br#"{"ID":"m","TYPE":"DATA.TEXT","TO_ROOM":"r"}"#)
    }

    #[test]
    fn join_is_idempotent() {
        let reg = RoomRegistry::new();
        let (a, _rx) = make_connection("a");
        reg.register(a.clone());

        assert!(reg.join(&a.id, &room("r")));
        assert!(!reg.join(&a.id, &room("r")));
        assert_eq!(reg.room_members(&room("r")), vec![a.id.clone()]);
        assert_eq!(reg.rooms_of(&a.id), vec![room("r")]);
    }

    #[test]
    fn join_requires_registration() {
        let reg = RoomRegistry::new();
        assert!(!reg.join(&ConnectionId::from("ghost"), &room("r")));
        assert_eq!(reg.room_count(), 0);
    }

    #[tokio::test]
    async fn fan_out_excludes_sender() {
        let reg = RoomRegistry::new();
        let (a, mut rx_a) = make_connection("a");
        let (b, mut rx_b) = make_connection("b");
        let (c, mut rx_c) = make_connection("c");
        for conn in [&a, &b, &c] {
            reg.register(conn.clone());
            let _ = reg.join(&conn.id, &room("r"));
        }

        let outcome = reg.route(&a.id, &room("r"), &frame());
        assert_eq!(outcome, RouteOutcome { delivered: 2, dropped: 0 });
        assert_eq!(rx_b.recv().await.unwrap(), frame());
        assert_eq!(rx_c.recv().await.unwrap(), frame());
        assert!(rx_a.try_recv().is_err());
    }

    #[test]
    fn non_member_sender_still_routes() {
        let reg = RoomRegistry::new();
        let (a, _rx_a) = make_connection("a");
        let (b, mut rx_b) = make_connection("b");
        reg.register(a.clone());
        reg.register(b.clone());
        let _ = reg.join(&b.id, &room("r"));

        assert_eq!(reg.route(&a.id, &room("r"), &frame()).delivered, 1);
        assert!(rx_b.try_recv().is_ok());
    }

    #[test]
    fn unknown_room_is_a_miss() {
        let reg = RoomRegistry::new();
        let (a, _rx) = make_connection("a");
        reg.register(a.clone());
        assert!(reg.route(&a.id, &room("nowhere"), &frame()).is_miss());
    }

    #[test]
    fn sender_alone_in_room_is_a_miss() {
        let reg = RoomRegistry::new();
        let (a, mut rx) = make_connection("a");
        reg.register(a.clone());
        let _ = reg.join(&a.id, &room("r"));
        assert!(reg.route(&a.id, &room("r"), &frame()).is_miss());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn leave_removes_membership_and_empty_room() {
        let reg = RoomRegistry::new();
        let (a, _rx) = make_connection("a");
        reg.register(a.clone());
        let _ = reg.join(&a.id, &room("r"));

        assert!(reg.leave(&a.id, &room("r")));
        assert!(!reg.leave(&a.id, &room("r")));
        assert!(reg.room_members(&room("r")).is_empty());
        assert!(reg.rooms_of(&a.id).is_empty());
        assert_eq!(reg.room_count(), 0);
    }

    #[test]
    fn disconnect_removes_from_all_rooms() {
        let reg = RoomRegistry::new();
        let (a, _rx_a) = make_connection("a");
        let (b, _rx_b) = make_connection("b");
        reg.register(a.clone());
        reg.register(b.clone());
        for name in ["x", "y", "z"] {
            let _ = reg.join(&a.id, &room(name));
        }
        let _ = reg.join(&b.id, &room("y"));

        let left = reg.disconnect(&a.id);
        assert_eq!(left, vec![room("x"), room("y"), room("z")]);
        assert_eq!(reg.connection_count(), 1);
        assert_eq!(reg.room_count(), 1);
        assert_eq!(reg.room_members(&room("y")), vec![b.id.clone()]);
        assert!(reg.connection(&a.id).is_none());
    }

    #[test]
    fn disconnect_unknown_is_noop() {
        let reg = RoomRegistry::new();
        assert!(reg.disconnect(&ConnectionId::from("ghost")).is_empty());
    }

    #[test]
    fn slow_member_keeps_every_frame() {
        let reg = RoomRegistry::new();
        let (a, _rx_a) = make_connection("a");
        let (slow, mut rx_slow) = make_connection_with_high_water("slow", 1);
        let (fast, mut rx_fast) = make_connection("fast");
        for conn in [&a, &slow, &fast] {
            reg.register(conn.clone());
            let _ = reg.join(&conn.id, &room("r"));
        }

        for _ in 0..100 {
            assert_eq!(
                reg.route(&a.id, &room("r"), &frame()),
                RouteOutcome { delivered: 2, dropped: 0 }
            );
        }
        assert_eq!(slow.queued(), 100);
        assert_eq!(slow.drop_count(), 0);
        for _ in 0..100 {
            assert_eq!(rx_slow.try_recv().unwrap(), frame());
            assert_eq!(rx_fast.try_recv().unwrap(), frame());
        }
    }

    #[test]
    fn closing_member_drops_only_that_copy() {
        let reg = RoomRegistry::new();
        let (a, _rx_a) = make_connection("a");
        let (gone, rx_gone) = make_connection("gone");
        let (fast, mut rx_fast) = make_connection("fast");
        for conn in [&a, &gone, &fast] {
            reg.register(conn.clone());
            let _ = reg.join(&conn.id, &room("r"));
        }
        drop(rx_gone);

        let outcome = reg.route(&a.id, &room("r"), &frame());
        assert_eq!(outcome, RouteOutcome { delivered: 1, dropped: 1 });
        assert_eq!(gone.drop_count(), 1);
        assert!(rx_fast.try_recv().is_ok());
    }

    #[test]
    fn concurrent_join_and_route() {
        let reg = Arc::new(RoomRegistry::new());
        let (sender, _rx) = make_connection("sender");
        reg.register(sender.clone());

        let mut receivers = Vec::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let (conn, rx) = make_connection(&format!("m{i}"));
                receivers.push(rx);
                let reg = reg.clone();
                std::thread::spawn(move || {
                    reg.register(conn.clone());
                    for _ in 0..50 {
                        let _ = reg.join(&conn.id, &room("r"));
                        let _ = reg.leave(&conn.id, &room("r"));
                    }
                    let _ = reg.join(&conn.id, &room("r"));
                })
            })
            .collect();
        for _ in 0..200 {
            let outcome = reg.route(&sender.id, &room("r"), &frame());
            assert!(outcome.delivered <= 8);
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(reg.room_members(&room("r")).len(), 8);
        assert_eq!(reg.route(&sender.id, &room("r"), &frame()).delivered, 8);
    }
}
