//! The message envelope exchanged between components.
//!
//! A [`Message`] is one JSON object on the wire. Four keys belong to the
//! protocol and are strongly typed here:
//!
//! | key       | field      | notes                                        |
//! |-----------|------------|----------------------------------------------|
//! | `ID`      | `id`       | unique per message instance                  |
//! | `ROOT_ID` | `root_id`  | optional, copied verbatim through every relay |
//! | `TYPE`    | `kind`     | [`MessageType`], dotted string form           |
//! | `TO_ROOM` | `to_room`  | destination room, required for routing        |
//!
//! Every other key is application data and lives in the open [`Payload`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CoreError, Result};
use crate::ids::{MessageId, RoomName, RootId};

/// Keys owned by the protocol. A [`Payload`] never contains them.
pub const RESERVED_KEYS: [&str; 4] = ["ID", "ROOT_ID", "TYPE", "TO_ROOM"];

// ─────────────────────────────────────────────────────────────────────────────
// MessageType
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a message.
///
/// Serialized as a dotted string (`"DATA.TEXT"`, `"CONTROL.JOIN"`, ...).
/// Unrecognized strings are kept in [`MessageType::Other`] so a message from a
/// newer peer survives decoding and re-encoding untouched.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Free text.
    Text,
    /// Application-defined structured data.
    Custom,
    /// Forward pass of a split computation.
    Forward,
    /// Gradient (backward pass) of a split computation.
    Gradient,
    /// Control: join the room named in `TO_ROOM`.
    Join,
    /// Control: leave the room named in `TO_ROOM`.
    Leave,
    /// Any type string this build does not know.
    Other(String),
}

impl MessageType {
    /// Wire representation.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text => "DATA.TEXT",
            Self::Custom => "DATA.CUSTOM",
            Self::Forward => "DATA.FORWARD",
            Self::Gradient => "DATA.GRADIENT",
            Self::Join => "CONTROL.JOIN",
            Self::Leave => "CONTROL.LEAVE",
            Self::Other(s) => s,
        }
    }

    /// Whether the broker consumes this type instead of routing it.
    pub fn is_control(&self) -> bool {
        matches!(self, Self::Join | Self::Leave)
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        match s.as_str() {
            "DATA.TEXT" => Self::Text,
            "DATA.CUSTOM" => Self::Custom,
            "DATA.FORWARD" => Self::Forward,
            "DATA.GRADIENT" => Self::Gradient,
            "CONTROL.JOIN" => Self::Join,
            "CONTROL.LEAVE" => Self::Leave,
            _ => Self::Other(s),
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        Self::from(s.to_owned())
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(s) => s,
            known => known.as_str().to_owned(),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lenient parsing for human input: accepts the wire form as well as the
/// bare suffix in any case (`text`, `Forward`, `join`).
impl FromStr for MessageType {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let kind = match s.to_ascii_uppercase().as_str() {
            "TEXT" | "DATA.TEXT" => Self::Text,
            "CUSTOM" | "DATA.CUSTOM" => Self::Custom,
            "FORWARD" | "DATA.FORWARD" => Self::Forward,
            "GRADIENT" | "DATA.GRADIENT" => Self::Gradient,
            "JOIN" | "CONTROL.JOIN" => Self::Join,
            "LEAVE" | "CONTROL.LEAVE" => Self::Leave,
            _ => Self::Other(s.to_owned()),
        };
        Ok(kind)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Payload
// ─────────────────────────────────────────────────────────────────────────────

/// Open application data of a message: string keys to arbitrary JSON values.
///
/// Construction rejects [`RESERVED_KEYS`], so a payload can always be
/// flattened next to the envelope fields without key collisions.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Empty payload.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build from a JSON value, which must be an object free of reserved keys.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Self::from_map(map),
            Value::Null => Err(CoreError::NotAnObject("null")),
            Value::Bool(_) => Err(CoreError::NotAnObject("bool")),
            Value::Number(_) => Err(CoreError::NotAnObject("number")),
            Value::String(_) => Err(CoreError::NotAnObject("string")),
            Value::Array(_) => Err(CoreError::NotAnObject("array")),
        }
    }

    /// Build from a JSON map free of reserved keys.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        if let Some(key) = map.keys().find(|k| is_reserved(k)) {
            return Err(CoreError::ReservedKey(key.clone()));
        }
        Ok(Self(map))
    }

    /// Insert a value, returning the previous one under `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Option<Value>> {
        let key = key.into();
        if is_reserved(&key) {
            return Err(CoreError::ReservedKey(key));
        }
        Ok(self.0.insert(key, value.into()))
    }

    /// Remove and return the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Consume into the underlying JSON map.
    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl std::ops::Deref for Payload {
    type Target = Map<String, Value>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Value> for Payload {
    type Error = CoreError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::Object(payload.0)
    }
}

fn is_reserved(key: &str) -> bool {
    RESERVED_KEYS.contains(&key)
}

// ─────────────────────────────────────────────────────────────────────────────
// Message
// ─────────────────────────────────────────────────────────────────────────────

/// One message on the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique per message instance.
    #[serde(rename = "ID")]
    pub id: MessageId,
    /// Originating request chain. Propagated verbatim, never regenerated.
    #[serde(rename = "ROOT_ID", default, skip_serializing_if = "Option::is_none")]
    pub root_id: Option<RootId>,
    /// Message kind.
    #[serde(rename = "TYPE")]
    pub kind: MessageType,
    /// Destination room.
    #[serde(rename = "TO_ROOM", default, skip_serializing_if = "Option::is_none")]
    pub to_room: Option<RoomName>,
    #[serde(flatten)]
    payload: Payload,
}

impl Message {
    /// New message with a fresh `id` addressed to `room`.
    pub fn new(kind: MessageType, room: impl Into<RoomName>) -> Self {
        Self {
            id: MessageId::new(),
            root_id: None,
            kind,
            to_room: Some(room.into()),
            payload: Payload::new(),
        }
    }

    /// Control message asking the broker to add the sender to `room`.
    pub fn join(room: impl Into<RoomName>) -> Self {
        Self::new(MessageType::Join, room)
    }

    /// Control message asking the broker to remove the sender from `room`.
    pub fn leave(room: impl Into<RoomName>) -> Self {
        Self::new(MessageType::Leave, room)
    }

    /// Replace the message id.
    #[must_use]
    pub fn with_id(mut self, id: MessageId) -> Self {
        self.id = id;
        self
    }

    /// Attach an existing request chain.
    #[must_use]
    pub fn with_root(mut self, root_id: RootId) -> Self {
        self.root_id = Some(root_id);
        self
    }

    /// Start a new request chain rooted at a fresh id.
    #[must_use]
    pub fn start_chain(self) -> Self {
        self.with_root(RootId::new())
    }

    /// Replace the whole payload.
    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    /// Add one payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Result<Self> {
        let _ = self.payload.insert(key, value)?;
        Ok(self)
    }

    /// Build the message a handler emits in answer to `self`: fresh id,
    /// inherited `root_id`, the given type, room, and payload.
    pub fn derive_reply(&self, kind: MessageType, room: impl Into<RoomName>, payload: Payload) -> Self {
        Self {
            id: MessageId::new(),
            root_id: self.root_id.clone(),
            kind,
            to_room: Some(room.into()),
            payload,
        }
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    /// Payload (everything except the envelope keys).
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Mutable payload. Reserved keys are still refused on insert.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Consume into the payload.
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Whether the broker treats this message as a membership command.
    pub fn is_control(&self) -> bool {
        self.kind.is_control()
    }

    /// Serialize to the JSON body carried inside a frame.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a frame body.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// The two envelope keys the broker needs to route a frame.
///
/// Deserializing into this type skips the payload entirely, so routing never
/// depends on application data.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RouteHeader {
    /// Message kind.
    #[serde(rename = "TYPE")]
    pub kind: MessageType,
    /// Destination room, if any.
    #[serde(rename = "TO_ROOM", default)]
    pub to_room: Option<RoomName>,
}

impl RouteHeader {
    /// Read the routing keys out of a frame body.
    pub fn peek(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
