//! Transport abstraction and the WebSocket implementation
//!
//! A transport opens one full-duplex text connection per call. Outbound
//! frames arrive on an mpsc channel; everything the connection observes is
//! reported back through [`ConnectionEvents`], tagged with the connection
//! generation so the client can tell stale connections apart.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info};

use crate::client::Signal;
use crate::error::ClientError;

/// Something a connection observed
#[derive(Debug)]
pub enum TransportEvent {
    /// Handshake completed; outbound frames are now written
    Opened,
    /// Inbound text frame
    Message(String),
    /// Transport-level failure; a `Closed` event follows
    Error(ClientError),
    /// Connection ended, with the peer's close reason if any
    Closed(Option<String>),
}

/// Event reporter handed to a transport for one connection
#[derive(Debug, Clone)]
pub struct ConnectionEvents {
    generation: u64,
    tx: mpsc::UnboundedSender<Signal>,
}

impl ConnectionEvents {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<Signal>) -> Self {
        Self { generation, tx }
    }

    /// Generation of the connection this reporter belongs to
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn opened(&self) {
        self.emit(TransportEvent::Opened);
    }

    pub fn message(&self, text: String) {
        self.emit(TransportEvent::Message(text));
    }

    pub fn error(&self, err: ClientError) {
        self.emit(TransportEvent::Error(err));
    }

    pub fn closed(&self, reason: Option<String>) {
        self.emit(TransportEvent::Closed(reason));
    }

    /// Check if the client has gone away
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.tx.send(Signal::Transport {
            generation: self.generation,
            event,
        });
    }
}

/// Full-duplex message transport
///
/// `open` resolves once the connection is established or has failed.
/// On success the transport must call [`ConnectionEvents::opened`] before
/// reporting any message, write every string received on `outbound` as a
/// text frame in order, close the connection when `outbound` is closed,
/// and report `closed` exactly once when the connection ends. On failure
/// nothing is reported through `events`.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn open(
        &self,
        url: &str,
        outbound: mpsc::UnboundedReceiver<String>,
        events: ConnectionEvents,
    ) -> Result<(), ClientError>;
}

/// WebSocket transport built on tokio-tungstenite
///
/// Each connection runs a read task (WebSocket → events) and a write task
/// (outbound channel → WebSocket).
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransport;

#[async_trait]
impl Transport for WsTransport {
    async fn open(
        &self,
        url: &str,
        mut outbound: mpsc::UnboundedReceiver<String>,
        events: ConnectionEvents,
    ) -> Result<(), ClientError> {
        debug!("Opening WebSocket to {}", url);

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ClientError::TransportOpen(e.to_string()))?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let generation = events.generation();
        info!("WebSocket {} connected to {}", generation, url);
        events.opened();

        // Spawn write task (outbound channel -> WebSocket)
        tokio::spawn(async move {
            while let Some(text) = outbound.recv().await {
                if let Err(e) = ws_sender.send(Message::Text(text.into())).await {
                    debug!("WebSocket send failed, ending write task: {}", e);
                    break;
                }
            }
            debug!("Write task ended for connection {}", generation);

            // Send close frame when done
            let _ = ws_sender.close().await;
        });

        // Spawn read task (WebSocket -> events)
        tokio::spawn(async move {
            let mut reason = None;
            while let Some(msg_result) = ws_receiver.next().await {
                if events.is_closed() {
                    debug!("Client gone, ending read task {}", generation);
                    break;
                }
                match msg_result {
                    Ok(Message::Text(text)) => {
                        events.message(text.to_string());
                    }
                    Ok(Message::Close(frame)) => {
                        debug!("Server sent close frame on connection {}", generation);
                        reason = frame.map(|f| f.reason.to_string());
                        break;
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                        // Pong replies are handled by tungstenite
                    }
                    Ok(_) => {
                        // Binary or other message types - ignore
                    }
                    Err(e) => {
                        error!("WebSocket error on connection {}: {}", generation, e);
                        events.error(ClientError::WebSocket(e));
                        break;
                    }
                }
            }
            debug!("Read task ended for connection {}", generation);
            events.closed(reason);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    use crate::client::{ChatClient, ConnectionState};
    use crate::config::ClientConfig;
    use crate::presenter::LogPresenter;
    use crate::types::UserId;

    #[test]
    fn test_connection_events_tagging() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = ConnectionEvents::new(7, tx);

        events.message("hello".to_string());
        events.closed(None);

        match rx.try_recv().unwrap() {
            Signal::Transport {
                generation,
                event: TransportEvent::Message(text),
            } => {
                assert_eq!(generation, 7);
                assert_eq!(text, "hello");
            }
            other => panic!("Wrong signal: {:?}", other),
        }
        assert!(matches!(
            rx.try_recv().unwrap(),
            Signal::Transport {
                event: TransportEvent::Closed(None),
                ..
            }
        ));
    }

    #[test]
    fn test_connection_events_after_client_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        let events = ConnectionEvents::new(1, tx);
        drop(rx);

        assert!(events.is_closed());
        // Reporting into a dropped client is silently ignored
        events.opened();
    }

    #[tokio::test]
    async fn test_ws_transport_open_failure() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (_out_tx, out_rx) = mpsc::unbounded_channel();

        let result = WsTransport
            .open("ws://127.0.0.1:1/ws/u/r", out_rx, ConnectionEvents::new(1, tx))
            .await;

        assert!(matches!(result, Err(ClientError::TransportOpen(_))));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ws_transport_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Minimal server: greet, then record frames until the close frame
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let welcome = json!({"type": "welcome", "connection_id": "c1", "room_id": "general"});
            ws.send(Message::Text(welcome.to_string().into())).await.unwrap();

            let mut received = Vec::new();
            while let Some(msg) = ws.next().await {
                match msg {
                    Ok(Message::Text(text)) => received.push(text.to_string()),
                    Ok(Message::Close(_)) => {
                        received.push("CLOSE".to_string());
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => panic!("Server read failed: {}", e),
                }
            }
            received
        });

        let config = ClientConfig::new(format!("http://{}", addr));
        let (mut client, _handle) = ChatClient::new(config, WsTransport, LogPresenter);

        assert!(!client.send_message("chat_message", json!({ "content": "queued" })));
        client.connect(Some(UserId::from("alice")), None);

        timeout(Duration::from_secs(5), client.step()).await.unwrap();
        assert!(client.is_connected());
        assert_eq!(client.queue_len(), 0);
        assert!(client.send_message("chat_message", json!({ "content": "live" })));

        timeout(Duration::from_secs(5), client.step()).await.unwrap();
        assert_eq!(client.connection_id().map(|c| c.0.as_str()), Some("c1"));

        client.disconnect();
        let received = timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(received.len(), 3, "{:?}", received);
        let frames: Vec<Value> = received[..2]
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect();
        assert_eq!(frames[0]["type"], "chat_message");
        assert_eq!(frames[0]["content"], "queued");
        assert_eq!(frames[1]["content"], "live");
        assert!(frames[1]["timestamp"].is_string());
        assert_eq!(received[2], "CLOSE");
    }

    #[tokio::test]
    async fn test_silent_server_times_out_handshake() {
        // Accepts TCP through the backlog but never answers the upgrade
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let config = ClientConfig::new(format!("ws://{}", addr))
            .open_timeout(Duration::from_millis(200));
        let (mut client, _handle) = ChatClient::new(config, WsTransport, LogPresenter);

        client.connect(None, None);
        assert_eq!(client.state(), ConnectionState::Connecting);

        timeout(Duration::from_secs(5), client.step()).await.unwrap();
        assert_eq!(client.state(), ConnectionState::Reconnecting);
        assert_eq!(client.reconnect_attempts(), 1);
        drop(listener);
    }
}
