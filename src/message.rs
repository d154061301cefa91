//! Message protocol definitions
//!
//! JSON text frames in both directions. Outbound frames are envelopes
//! (`type`, `timestamp`, payload fields); inbound frames are decoded with
//! Serde's tagged enum for type-safe dispatch.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ClientError;
use crate::room::RoomUser;
use crate::types::{RequestId, RoomId};

/// Envelope fields owned by [`OutboundMessage`] itself
const RESERVED_KEYS: [&str; 2] = ["type", "timestamp"];

/// Outbound envelope
///
/// `{ "type": ..., "timestamp": ..., ...payload }`. Built once and never
/// modified afterwards, so a queued message is sent exactly as it was
/// created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    kind: String,
    timestamp: String,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl OutboundMessage {
    /// Build an envelope stamped with the current UTC time
    ///
    /// Object payloads are flattened into the envelope; `null` means no
    /// payload; any other value is carried under `data`. Payload keys that
    /// collide with `type` or `timestamp` are dropped.
    pub fn new(kind: impl Into<String>, data: Value) -> Self {
        let mut payload = match data {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("data".to_string(), other);
                map
            }
        };
        for key in RESERVED_KEYS {
            if payload.remove(key).is_some() {
                tracing::debug!("Dropped reserved payload key '{}'", key);
            }
        }

        Self {
            kind: kind.into(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            payload,
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// Serialize to a JSON text frame
    pub fn to_json(&self) -> Result<String, ClientError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Client → Server message
///
/// Typed payloads for the message kinds the server understands.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Chat message to the current room
    ChatMessage { content: String },
    /// Ask the assistant to answer in the room
    AiRequest {
        content: String,
        personality: String,
        request_id: RequestId,
    },
    /// Move to another room
    JoinRoom { room_id: RoomId },
    /// Indicate typing started
    TypingStart,
    /// Indicate typing stopped
    TypingStop,
    /// Real-time collaboration action (cursor, selection, ...)
    CollaborationAction { action: String, data: Value },
}

impl From<ClientMessage> for OutboundMessage {
    fn from(msg: ClientMessage) -> Self {
        let mut fields = match serde_json::to_value(&msg) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            _ => String::new(),
        };
        OutboundMessage::new(kind, Value::Object(fields))
    }
}

/// A chat message as broadcast by the server
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatEntry {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

/// An assistant reply as broadcast by the server
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AiReply {
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub personality: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Server → Client message
///
/// Uses tagged enum with snake_case naming. Missing lists decode as empty.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// First message on a new connection
    Welcome {
        connection_id: String,
        room_id: String,
        #[serde(default)]
        room_users: Vec<RoomUser>,
        #[serde(default)]
        recent_messages: Vec<Value>,
    },
    /// Chat message in the current room
    ChatMessage(ChatEntry),
    /// Assistant reply in the current room
    AiResponse(AiReply),
    /// Assistant request failed
    AiError {
        #[serde(default)]
        request_id: Option<String>,
        #[serde(default)]
        error: String,
    },
    /// Someone entered the room
    UserJoined {
        user_id: String,
        #[serde(default)]
        room_users: Vec<RoomUser>,
    },
    /// Someone left the room
    UserLeft {
        user_id: String,
        #[serde(default)]
        room_users: Vec<RoomUser>,
    },
    /// Set of users currently typing
    TypingUpdate {
        #[serde(default)]
        typing_users: Vec<String>,
    },
    /// Opaque collaboration payload, passed through untouched
    CollaborationAction,
    /// Confirmation of a `join_room` request
    RoomChanged {
        room_id: String,
        #[serde(default)]
        room_users: Vec<RoomUser>,
        #[serde(default)]
        recent_messages: Vec<Value>,
    },
    /// Any other `type`
    #[serde(other)]
    Unknown,
}

/// Entry of a recent-message backlog that should be displayed
#[derive(Debug, Clone, PartialEq)]
pub enum BacklogEntry {
    Chat(ChatEntry),
    Ai(AiReply),
}

/// Pick the displayable entries out of a backlog, preserving order
///
/// Only `chat_message` and `ai_response` entries are kept.
pub fn backlog_entries(recent: &[Value]) -> Vec<BacklogEntry> {
    recent
        .iter()
        .filter_map(|raw| match serde_json::from_value::<ServerMessage>(raw.clone()) {
            Ok(ServerMessage::ChatMessage(entry)) => Some(BacklogEntry::Chat(entry)),
            Ok(ServerMessage::AiResponse(reply)) => Some(BacklogEntry::Ai(reply)),
            _ => None,
        })
        .collect()
}
