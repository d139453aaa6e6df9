//! # swergio-core
//!
//! Shared vocabulary of the swergio messaging substrate:
//!
//! - **Branded IDs**: `MessageId`, `RootId`, `ConnectionId` (generated) and
//!   `RoomName`, `ParticipantId` (application-chosen)
//! - **Messages**: the [`Message`] envelope with its open [`Payload`] and
//!   [`MessageType`]
//! - **Triggers**: [`Trigger`] predicates over (type, room)
//! - **Logging**: `tracing` subscriber setup and log capture for tests

#![deny(unsafe_code)]

pub mod errors;
pub mod ids;
pub mod logging;
pub mod message;
pub mod trigger;

pub use errors::{CoreError, Result};
pub use ids::{ConnectionId, MessageId, ParticipantId, RoomName, RootId};
pub use message::{Message, MessageType, Payload, RESERVED_KEYS, RouteHeader};
pub use trigger::Trigger;
