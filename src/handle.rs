//! Client handle
//!
//! Cheap, cloneable front for a running [`ChatClient`](crate::ChatClient).
//! Every call becomes a [`ClientCommand`] processed in order by the actor.

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::client::{ClientCommand, ConnectionInfo};
use crate::error::SendError;
use crate::events::EventHandlers;
use crate::message::{ClientMessage, OutboundMessage};
use crate::types::{RequestId, RoomId, UserId};

/// Personality used when the caller does not pick one
pub const DEFAULT_PERSONALITY: &str = "default";

/// Command sender into a chat client actor
#[derive(Debug, Clone)]
pub struct ClientHandle {
    sender: mpsc::Sender<ClientCommand>,
}

impl ClientHandle {
    pub(crate) fn new(sender: mpsc::Sender<ClientCommand>) -> Self {
        Self { sender }
    }

    async fn command(&self, cmd: ClientCommand) -> Result<(), SendError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| SendError::ChannelClosed)
    }

    /// Connect, optionally as another user or to another room
    pub async fn connect(
        &self,
        user_id: Option<UserId>,
        room_id: Option<RoomId>,
    ) -> Result<(), SendError> {
        self.command(ClientCommand::Connect { user_id, room_id }).await
    }

    pub async fn disconnect(&self) -> Result<(), SendError> {
        self.command(ClientCommand::Disconnect).await
    }

    /// Send an envelope of the given type; `Ok(false)` means it was queued
    pub async fn send_message(
        &self,
        kind: impl Into<String>,
        data: Value,
    ) -> Result<bool, SendError> {
        self.send(OutboundMessage::new(kind, data)).await
    }

    /// Send a prepared message; `Ok(false)` means it was queued
    pub async fn send(&self, message: impl Into<OutboundMessage>) -> Result<bool, SendError> {
        let (reply, rx) = oneshot::channel();
        self.command(ClientCommand::Send {
            message: message.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| SendError::ChannelClosed)
    }

    pub async fn send_chat_message(&self, content: impl Into<String>) -> Result<bool, SendError> {
        self.send(ClientMessage::ChatMessage {
            content: content.into(),
        })
        .await
    }

    /// Ask the assistant; returns the request id and whether it went out immediately
    pub async fn send_ai_request(
        &self,
        content: impl Into<String>,
        personality: Option<&str>,
    ) -> Result<(RequestId, bool), SendError> {
        let request_id = RequestId::generate();
        let sent = self
            .send(ClientMessage::AiRequest {
                content: content.into(),
                personality: personality.unwrap_or(DEFAULT_PERSONALITY).to_string(),
                request_id: request_id.clone(),
            })
            .await?;
        Ok((request_id, sent))
    }

    /// Ask the server to move this connection to another room
    pub async fn join_room(&self, room_id: RoomId) -> Result<bool, SendError> {
        self.send(ClientMessage::JoinRoom { room_id }).await
    }

    pub async fn send_collaboration_action(
        &self,
        action: impl Into<String>,
        data: Value,
    ) -> Result<bool, SendError> {
        self.send(ClientMessage::CollaborationAction {
            action: action.into(),
            data,
        })
        .await
    }

    pub async fn start_typing(&self) -> Result<(), SendError> {
        self.command(ClientCommand::StartTyping).await
    }

    pub async fn stop_typing(&self) -> Result<(), SendError> {
        self.command(ClientCommand::StopTyping).await
    }

    /// Replace all four callback slots
    pub async fn set_event_handlers(&self, handlers: EventHandlers) -> Result<(), SendError> {
        self.command(ClientCommand::SetEventHandlers { handlers }).await
    }

    pub async fn connection_info(&self) -> Result<ConnectionInfo, SendError> {
        let (reply, rx) = oneshot::channel();
        self.command(ClientCommand::Info { reply }).await?;
        rx.await.map_err(|_| SendError::ChannelClosed)
    }

    /// Disconnect and stop the client actor
    pub async fn shutdown(&self) -> Result<(), SendError> {
        self.command(ClientCommand::Shutdown).await
    }

    /// Check if the client actor has stopped
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}
