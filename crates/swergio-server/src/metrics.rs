//! Metric names recorded by the broker.
//!
//! Recorded through the `metrics` facade; the embedding process decides
//! whether an exporter is installed.

/// Connections accepted (counter).
pub const CONNECTIONS_TOTAL: &str = "broker_connections_total";
/// Connections currently open (gauge).
pub const CONNECTIONS_ACTIVE: &str = "broker_connections_active";
/// Connections refused because the limit was reached (counter).
pub const CONNECTIONS_REJECTED_TOTAL: &str = "broker_connections_rejected_total";
/// Frame copies enqueued to room members (counter).
pub const FRAMES_ROUTED_TOTAL: &str = "broker_frames_routed_total";
/// Frames addressed to a room with no other member (counter).
pub const ROUTING_MISS_TOTAL: &str = "broker_routing_miss_total";
/// Frame copies dropped because the member was closing (counter).
pub const FRAMES_DROPPED_TOTAL: &str = "broker_frames_dropped_total";
/// Frames whose body could not be parsed (counter).
pub const FRAMES_INVALID_TOTAL: &str = "broker_frames_invalid_total";
