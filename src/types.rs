//! Basic type definitions for the chat client
//!
//! Provides newtype wrappers for type safety:
//! - `UserId`: local user identifier, generated as `user_` + 9 characters
//! - `RoomId`: room name, `general` unless told otherwise
//! - `ConnectionId`: opaque id issued by the server in its welcome message
//! - `RequestId`: correlates an AI request with its response

use serde::{Deserialize, Serialize};

/// Length of the random suffix used by generated identifiers
const RANDOM_SUFFIX_LEN: usize = 9;

/// Room joined when the caller does not name one
pub const DEFAULT_ROOM: &str = "general";

/// Random lowercase alphanumeric suffix
fn random_suffix() -> String {
    use rand::Rng;
    rand::thread_rng()
        .sample_iter(&rand::distributions::Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect::<String>()
        .to_lowercase()
}

/// User identifier (newtype pattern)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    /// Generate a new random user id (`user_xxxxxxxxx`)
    pub fn generate() -> Self {
        Self(format!("user_{}", random_suffix()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self(DEFAULT_ROOM.to_string())
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Server-assigned connection identifier
///
/// Only known after the server's `welcome` message; cleared on disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(pub String);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// AI request correlation id (`req_xxxxxxxxx`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("req_{}", random_suffix()))
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
