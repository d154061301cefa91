//! Room state mirror
//!
//! The client's local view of the room it is connected to: which room,
//! who is in it, and who is typing. Updated only from server messages.

use serde::{Deserialize, Serialize};

use crate::types::RoomId;

/// Room member as listed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub user_id: String,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub connected_at: Option<String>,
    #[serde(default)]
    pub last_activity: Option<String>,
}

/// Local room view
#[derive(Debug, Clone)]
pub struct RoomState {
    /// Current room
    pub room_id: RoomId,
    /// Members as of the last membership update
    pub users: Vec<RoomUser>,
    /// Other users currently typing
    pub typing_users: Vec<String>,
}

impl RoomState {
    /// Create an empty view of the given room
    pub fn new(room_id: RoomId) -> Self {
        Self {
            room_id,
            users: Vec::new(),
            typing_users: Vec::new(),
        }
    }

    /// Switch to another room, dropping the old room's membership
    pub fn enter(&mut self, room_id: RoomId) {
        if self.room_id != room_id {
            self.typing_users.clear();
        }
        self.room_id = room_id;
    }

    /// Replace the membership list
    pub fn set_users(&mut self, users: Vec<RoomUser>) {
        self.users = users;
    }

    /// Replace the typing set
    pub fn set_typing(&mut self, typing_users: Vec<String>) {
        self.typing_users = typing_users;
    }

    /// Forget membership and typing state (connection lost)
    pub fn clear(&mut self) {
        self.users.clear();
        self.typing_users.clear();
    }

    /// Get the number of listed members
    pub fn participant_count(&self) -> usize {
        self.users.len()
    }
}

impl Default for RoomState {
    fn default() -> Self {
        Self::new(RoomId::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> RoomUser {
        RoomUser {
            user_id: id.to_string(),
            connection_id: None,
            connected_at: None,
            last_activity: None,
        }
    }

    #[test]
    fn test_room_state_creation() {
        let room = RoomState::new(RoomId::from("dev"));
        assert_eq!(room.room_id.as_str(), "dev");
        assert_eq!(room.participant_count(), 0);
        assert!(room.typing_users.is_empty());
    }

    #[test]
    fn test_room_state_membership() {
        let mut room = RoomState::default();
        room.set_users(vec![user("alice"), user("bob")]);

        assert_eq!(room.participant_count(), 2);

        room.set_users(vec![user("alice")]);
        assert_eq!(room.participant_count(), 1);
        assert_eq!(room.users[0].user_id, "alice");

        room.clear();
        assert_eq!(room.participant_count(), 0);
        assert_eq!(room.room_id.as_str(), "general");
    }

    #[test]
    fn test_room_state_enter_clears_typing() {
        let mut room = RoomState::default();
        room.set_typing(vec!["bob".to_string()]);

        room.enter(RoomId::default());
        assert_eq!(room.typing_users.len(), 1);

        room.enter(RoomId::from("other"));
        assert!(room.typing_users.is_empty());
        assert_eq!(room.room_id.as_str(), "other");
    }

    #[test]
    fn test_room_user_lenient_decode() {
        let u: RoomUser = serde_json::from_str(r#"{"user_id": "alice"}"#).unwrap();
        assert_eq!(u, user("alice"));
    }
}
