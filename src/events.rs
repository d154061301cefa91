//! Caller-facing event callbacks
//!
//! Four optional slots, invoked synchronously on the client task. An unset
//! slot is simply skipped.

use std::fmt;

use serde_json::Value;

use crate::error::ClientError;
use crate::types::{RoomId, UserId};

/// Called with every parsed inbound envelope
pub type MessageCallback = Box<dyn FnMut(&Value) + Send>;
/// Called when a connection opens
pub type ConnectCallback = Box<dyn FnMut(&ConnectEvent) + Send>;
/// Called when a connection ends
pub type DisconnectCallback = Box<dyn FnMut(&DisconnectEvent) + Send>;
/// Called for every transport-level failure
pub type ErrorCallback = Box<dyn FnMut(&ClientError) + Send>;

/// Details of an opened connection
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectEvent {
    pub url: String,
    pub user_id: UserId,
    pub room_id: RoomId,
}

/// Why a connection ended
#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    /// `disconnect()` was called
    Requested,
    /// The transport closed, with the close reason if one was given
    Closed(Option<String>),
    /// The transport never opened
    OpenFailed,
}

/// Details of an ended connection
#[derive(Debug, Clone, PartialEq)]
pub struct DisconnectEvent {
    pub reason: DisconnectReason,
}

/// Callback slots
#[derive(Default)]
pub struct EventHandlers {
    pub on_message: Option<MessageCallback>,
    pub on_connect: Option<ConnectCallback>,
    pub on_disconnect: Option<DisconnectCallback>,
    pub on_error: Option<ErrorCallback>,
}

impl EventHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_message(mut self, f: impl FnMut(&Value) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    pub fn on_connect(mut self, f: impl FnMut(&ConnectEvent) + Send + 'static) -> Self {
        self.on_connect = Some(Box::new(f));
        self
    }

    pub fn on_disconnect(mut self, f: impl FnMut(&DisconnectEvent) + Send + 'static) -> Self {
        self.on_disconnect = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnMut(&ClientError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn message(&mut self, envelope: &Value) {
        if let Some(f) = self.on_message.as_mut() {
            f(envelope);
        }
    }

    pub(crate) fn connect(&mut self, event: &ConnectEvent) {
        if let Some(f) = self.on_connect.as_mut() {
            f(event);
        }
    }

    pub(crate) fn disconnect(&mut self, event: &DisconnectEvent) {
        if let Some(f) = self.on_disconnect.as_mut() {
            f(event);
        }
    }

    pub(crate) fn error(&mut self, err: &ClientError) {
        if let Some(f) = self.on_error.as_mut() {
            f(err);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandlers")
            .field("on_message", &self.on_message.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_unset_slots_are_noops() {
        let mut handlers = EventHandlers::new();
        handlers.message(&Value::Null);
        handlers.error(&ClientError::Transport("x".to_string()));
        handlers.disconnect(&DisconnectEvent {
            reason: DisconnectReason::Requested,
        });
    }

    #[test]
    fn test_set_slot_invoked() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut handlers = EventHandlers::new().on_message(move |v| {
            sink.lock().unwrap().push(v.clone());
        });

        handlers.message(&serde_json::json!({"type": "chat_message"}));
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert!(format!("{:?}", handlers).contains("on_message: true"));
    }
}
