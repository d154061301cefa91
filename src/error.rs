//! Error types for the chat client
//!
//! Defines client-level errors and handle → actor send errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

/// Client-level errors
///
/// None of these escape the public client operations: they are logged,
/// reported through the status line and handed to the `on_error` callback.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The transport could not be opened
    #[error("Connection failed: {0}")]
    TransportOpen(String),

    /// A frame could not be handed to the transport
    #[error("Send failed: {0}")]
    TransportSend(String),

    /// Error reported by an open transport
    #[error("Transport error: {0}")]
    Transport(String),

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Automatic reconnection gave up
    #[error("Reconnect attempts exhausted after {attempts} tries")]
    ReconnectExhausted { attempts: u32 },

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Message send errors
///
/// Occurs when the client actor is no longer running.
#[derive(Debug, Error)]
pub enum SendError {
    /// The receiving end of the channel has been closed
    #[error("Channel closed")]
    ChannelClosed,
}
