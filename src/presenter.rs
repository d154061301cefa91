//! Host UI collaborator
//!
//! The client never renders anything itself. Everything user-visible goes
//! through a [`Presenter`], which the host application supplies.

use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::message::{AiReply, ChatEntry};
use crate::room::RoomUser;

/// Severity of a status line or notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Success,
    Error,
    Warning,
    Info,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusLevel::Success => "success",
            StatusLevel::Error => "error",
            StatusLevel::Warning => "warning",
            StatusLevel::Info => "info",
        };
        f.write_str(s)
    }
}

/// Display surface driven by the client
///
/// All methods default to doing nothing. Calls happen on the client task,
/// one at a time, in the order the triggering events were handled.
pub trait Presenter: Send + 'static {
    /// Connection status changed (connected, disconnected, error, reconnecting)
    fn show_status(&mut self, _status: &str, _level: StatusLevel) {}

    /// Transient notification such as "alice joined the room"
    fn show_notification(&mut self, _text: &str, _level: StatusLevel) {}

    /// Room membership changed
    fn update_room_users(&mut self, _users: &[RoomUser]) {}

    fn display_chat_message(&mut self, _entry: &ChatEntry) {}

    fn display_ai_response(&mut self, _reply: &AiReply) {}

    /// Set of users currently typing changed
    fn update_typing_users(&mut self, _users: &[String]) {}

    /// Collaboration payload, exactly as received
    fn collaboration_action(&mut self, _envelope: &Value) {}
}

/// Presenter that only writes to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn show_status(&mut self, status: &str, level: StatusLevel) {
        match level {
            StatusLevel::Error => error!("Connection status: {} ({})", status, level),
            StatusLevel::Warning => warn!("Connection status: {} ({})", status, level),
            _ => info!("Connection status: {} ({})", status, level),
        }
    }

    fn show_notification(&mut self, text: &str, level: StatusLevel) {
        info!("Notification: {} ({})", text, level);
    }

    fn update_room_users(&mut self, users: &[RoomUser]) {
        let names: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
        debug!("Room users: {:?}", names);
    }

    fn display_chat_message(&mut self, entry: &ChatEntry) {
        info!(
            "[{}] {}",
            entry.user_id.as_deref().unwrap_or("unknown"),
            entry.content
        );
    }

    fn display_ai_response(&mut self, reply: &AiReply) {
        info!("[Zeeky AI] {}", reply.content);
    }

    fn update_typing_users(&mut self, users: &[String]) {
        if !users.is_empty() {
            debug!("Users typing: {:?}", users);
        }
    }

    fn collaboration_action(&mut self, envelope: &Value) {
        debug!("Collaboration action: {}", envelope);
    }
}
