//! Broker-side state of one connected component.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use bytes::Bytes;
use swergio_core::ConnectionId;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// A connected component as seen by the router.
///
/// Holds the sending side of the connection's outbound queue. The queue is
/// drained by that connection's writer task, so every frame written to the
/// socket comes from one place and frames never interleave.
///
/// The queue never refuses a frame while the connection is open. A member
/// that reads slowly accumulates a backlog instead of losing frames; once the
/// backlog reaches `high_water` a warning is logged, and an info event once it
/// has drained below half of it.
pub struct BrokerConnection {
    /// Unique connection ID.
    pub id: ConnectionId,
    /// Remote address.
    pub peer: SocketAddr,
    tx: mpsc::UnboundedSender<Bytes>,
    high_water: usize,
    queued: AtomicUsize,
    congested: AtomicBool,
    connected_at: Instant,
    dropped_frames: AtomicU64,
}

impl BrokerConnection {
    /// Create a new connection around its outbound queue.
    pub fn new(id: ConnectionId, peer: SocketAddr, tx: mpsc::UnboundedSender<Bytes>, high_water: usize) -> Self {
        Self {
            id,
            peer,
            tx,
            high_water: high_water.max(1),
            queued: AtomicUsize::new(0),
            congested: AtomicBool::new(false),
            connected_at: Instant::now(),
            dropped_frames: AtomicU64::new(0),
        }
    }

    /// Enqueue a frame body for this connection.
    ///
    /// Returns `false` only if the connection is closing and its writer is
    /// gone; the dropped frame counter is incremented.
    pub fn send(&self, frame: Bytes) -> bool {
        // counted before the send so the writer never decrements first
        let depth = self.queued.fetch_add(1, Ordering::Relaxed) + 1;
        if self.tx.send(frame).is_err() {
            let _ = self.queued.fetch_sub(1, Ordering::Relaxed);
            let _ = self.dropped_frames.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        if depth >= self.high_water && !self.congested.swap(true, Ordering::Relaxed) {
            warn!(
                conn_id = %self.id,
                queued = depth,
                high_water = self.high_water,
                "member is reading slowly, frames are backing up"
            );
        }
        true
    }

    /// Record that the writer took one frame off the queue.
    pub fn written(&self) {
        let left = self.queued.fetch_sub(1, Ordering::Relaxed).saturating_sub(1);
        if left < self.high_water / 2 && self.congested.swap(false, Ordering::Relaxed) {
            info!(conn_id = %self.id, queued = left, "member caught up");
        }
    }

    /// Frames enqueued but not yet written.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    /// Total frames dropped for this connection.
    pub fn drop_count(&self) -> u64 {
        self.dropped_frames.load(Ordering::Relaxed)
    }

    /// Connection age.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}

impl std::fmt::Debug for BrokerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerConnection")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .field("queued", &self.queued())
            .field("dropped_frames", &self.drop_count())
            .finish_non_exhaustive()
    }
}
