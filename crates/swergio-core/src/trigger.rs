//! Predicates selecting which handlers see an incoming message.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ids::RoomName;
use crate::message::{Message, MessageType};

/// A predicate over (message type, destination room).
///
/// `None` on either side is a wildcard. `Trigger::new(MessageType::Text,
/// "galactic_chat")` matches only text messages addressed to that room;
/// `Trigger::on_type(MessageType::Gradient)` matches gradients in any room.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trigger {
    /// Required message type, or any.
    pub kind: Option<MessageType>,
    /// Required destination room, or any.
    pub room: Option<RoomName>,
}

impl Trigger {
    /// Match one type in one room.
    pub fn new(kind: MessageType, room: impl Into<RoomName>) -> Self {
        Self {
            kind: Some(kind),
            room: Some(room.into()),
        }
    }

    /// Match one type in every room.
    pub fn on_type(kind: MessageType) -> Self {
        Self {
            kind: Some(kind),
            room: None,
        }
    }

    /// Match every type in one room.
    pub fn in_room(room: impl Into<RoomName>) -> Self {
        Self {
            kind: None,
            room: Some(room.into()),
        }
    }

    /// Whether `message` satisfies this trigger.
    pub fn matches(&self, message: &Message) -> bool {
        let kind_ok = self.kind.as_ref().is_none_or(|k| *k == message.kind);
        let room_ok = self
            .room
            .as_ref()
            .is_none_or(|r| message.to_room.as_ref() == Some(r));
        kind_ok && room_ok
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = self.kind.as_ref().map_or("*", MessageType::as_str);
        let room = self.room.as_ref().map_or("*", RoomName::as_str);
        write!(f, "{kind}@{room}")
    }
}
