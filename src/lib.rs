//! Zeeky AI WebSocket Chat Client Library
//!
//! A reconnecting real-time chat client built with tokio-tungstenite
//! using the Actor pattern for state management.
//!
//! # Features
//! - Connection to `<server>/ws/<user>/<room>`
//! - Automatic reconnection with exponential backoff
//! - Bounded queue for messages sent while offline
//! - Typed dispatch of room, chat, assistant and typing messages
//! - Debounced typing indicator
//! - Optional `on_message` / `on_connect` / `on_disconnect` / `on_error` callbacks
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `ChatClient` is the actor owning all connection state
//! - `ClientHandle`s send it commands; transports and timers send it signals
//! - No locks needed - every event is handled one at a time on one task
//!
//! # Example
//! ```ignore
//! use zeeky_ws_client::{ChatClient, ClientConfig, LogPresenter, WsTransport};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ClientConfig::new("ws://127.0.0.1:8000");
//!     let (client, handle) = ChatClient::new(config, WsTransport, LogPresenter);
//!     tokio::spawn(client.run());
//!
//!     handle.connect(None, None).await.unwrap();
//!     handle.send_chat_message("hello").await.unwrap();
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handle;
pub mod message;
pub mod presenter;
pub mod queue;
pub mod room;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use client::{ChatClient, ClientCommand, ConnectionInfo, ConnectionState};
pub use config::ClientConfig;
pub use error::{ClientError, SendError};
pub use events::{ConnectEvent, DisconnectEvent, DisconnectReason, EventHandlers};
pub use handle::ClientHandle;
pub use message::{AiReply, ChatEntry, ClientMessage, OutboundMessage, ServerMessage};
pub use presenter::{LogPresenter, Presenter, StatusLevel};
pub use queue::MessageQueue;
pub use room::{RoomState, RoomUser};
pub use transport::{ConnectionEvents, Transport, TransportEvent, WsTransport};
pub use types::{ConnectionId, RequestId, RoomId, UserId};
