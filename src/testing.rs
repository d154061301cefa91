//! Test doubles: scripted transport and recording presenter

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::message::{AiReply, ChatEntry};
use crate::presenter::{Presenter, StatusLevel};
use crate::room::RoomUser;
use crate::transport::{ConnectionEvents, Transport};

struct MockConnection {
    outbound: Option<mpsc::UnboundedReceiver<String>>,
    events: ConnectionEvents,
    sent: Vec<String>,
}

#[derive(Default)]
struct MockState {
    /// Remaining opens that fail; `usize::MAX` fails forever
    failures: usize,
    /// Open without reporting `opened` until `complete_open` is called
    hold_open: bool,
    /// Never resolve `open`, like a server that accepts TCP and goes quiet
    hang_open: bool,
    opens: Vec<String>,
    connections: Vec<MockConnection>,
}

/// In-memory transport driven by the test
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    state: Arc<Mutex<MockState>>,
    pending: Arc<AtomicUsize>,
}

/// Counts an unresolved open for as long as its future is alive
struct PendingOpen(Arc<AtomicUsize>);

impl PendingOpen {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for PendingOpen {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport whose opens always fail
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail_next(usize::MAX);
        transport
    }

    /// Transport whose connections stay in the connecting phase
    pub fn held() -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().hold_open = true;
        transport
    }

    /// Transport whose opens never complete
    pub fn hanging() -> Self {
        let transport = Self::default();
        transport.state.lock().unwrap().hang_open = true;
        transport
    }

    /// Open calls that are still waiting for a handshake
    pub fn pending_opens(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn fail_next(&self, n: usize) {
        self.state.lock().unwrap().failures = n;
    }

    /// Number of open attempts so far
    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opens.len()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().unwrap().opens.clone()
    }

    /// Report `opened` on the latest connection
    pub fn complete_open(&self) {
        self.with_latest(|conn| conn.events.opened());
    }

    /// Deliver an inbound frame on the latest connection
    pub fn deliver(&self, text: &str) {
        self.with_latest(|conn| conn.events.message(text.to_string()));
    }

    /// Deliver an inbound frame on the connection with the given index
    pub fn deliver_on(&self, index: usize, text: &str) {
        let state = self.state.lock().unwrap();
        state.connections[index].events.message(text.to_string());
    }

    /// Close the latest connection from the server side
    pub fn close(&self, reason: Option<&str>) {
        self.with_latest(|conn| conn.events.closed(reason.map(str::to_string)));
    }

    /// Close the connection with the given index from the server side
    pub fn close_on(&self, index: usize) {
        let state = self.state.lock().unwrap();
        state.connections[index].events.closed(None);
    }

    /// Report a transport error on the latest connection
    pub fn error(&self, msg: &str) {
        self.with_latest(|conn| conn.events.error(ClientError::Transport(msg.to_string())));
    }

    /// Make the latest connection's writer go away
    pub fn break_writer(&self) {
        self.with_latest(|conn| conn.outbound = None);
    }

    /// Frames written so far, across all connections, in order
    pub fn sent(&self) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        let mut all = Vec::new();
        for conn in state.connections.iter_mut() {
            if let Some(rx) = conn.outbound.as_mut() {
                while let Ok(text) = rx.try_recv() {
                    conn.sent.push(text);
                }
            }
            all.extend(conn.sent.iter().cloned());
        }
        all
    }

    pub fn sent_values(&self) -> Vec<Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    /// `type` field of every frame written so far
    pub fn sent_kinds(&self) -> Vec<String> {
        self.sent_values()
            .iter()
            .map(|v| v["type"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    /// Whether the latest connection's outbound channel was closed by the client
    pub fn latest_closed_by_client(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        let Some(conn) = state.connections.last_mut() else {
            return false;
        };
        match conn.outbound.as_mut() {
            Some(rx) => {
                while let Ok(text) = rx.try_recv() {
                    conn.sent.push(text);
                }
                matches!(
                    rx.try_recv(),
                    Err(mpsc::error::TryRecvError::Disconnected)
                )
            }
            None => false,
        }
    }

    fn with_latest(&self, f: impl FnOnce(&mut MockConnection)) {
        let mut state = self.state.lock().unwrap();
        let conn = state.connections.last_mut().expect("no connection opened");
        f(conn);
    }

    /// Record the attempt and resolve it, or return `None` to hang
    fn begin_open(
        &self,
        url: &str,
        outbound: mpsc::UnboundedReceiver<String>,
        events: ConnectionEvents,
    ) -> Option<Result<(), ClientError>> {
        let mut state = self.state.lock().unwrap();
        state.opens.push(url.to_string());

        if state.hang_open {
            return None;
        }
        if state.failures > 0 {
            if state.failures != usize::MAX {
                state.failures -= 1;
            }
            return Some(Err(ClientError::TransportOpen(
                "connection refused".to_string(),
            )));
        }

        if !state.hold_open {
            events.opened();
        }
        state.connections.push(MockConnection {
            outbound: Some(outbound),
            events,
            sent: Vec::new(),
        });
        Some(Ok(()))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn open(
        &self,
        url: &str,
        outbound: mpsc::UnboundedReceiver<String>,
        events: ConnectionEvents,
    ) -> Result<(), ClientError> {
        match self.begin_open(url, outbound, events) {
            Some(result) => result,
            None => {
                let _pending = PendingOpen::new(&self.pending);
                std::future::pending().await
            }
        }
    }
}

/// Everything a presenter was asked to show
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum UiEvent {
    Status(String, StatusLevel),
    Notification(String, StatusLevel),
    RoomUsers(Vec<String>),
    Chat(String),
    Ai(String),
    Typing(Vec<String>),
    Collaboration(Value),
}

/// Presenter that records calls for later inspection
#[derive(Clone, Default)]
pub(crate) struct RecordingPresenter {
    events: Arc<Mutex<Vec<UiEvent>>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<UiEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Status(text, _) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn chats(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                UiEvent::Chat(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: UiEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn show_status(&mut self, status: &str, level: StatusLevel) {
        self.record(UiEvent::Status(status.to_string(), level));
    }

    fn show_notification(&mut self, text: &str, level: StatusLevel) {
        self.record(UiEvent::Notification(text.to_string(), level));
    }

    fn update_room_users(&mut self, users: &[RoomUser]) {
        self.record(UiEvent::RoomUsers(
            users.iter().map(|u| u.user_id.clone()).collect(),
        ));
    }

    fn display_chat_message(&mut self, entry: &ChatEntry) {
        self.record(UiEvent::Chat(entry.content.clone()));
    }

    fn display_ai_response(&mut self, reply: &AiReply) {
        self.record(UiEvent::Ai(reply.content.clone()));
    }

    fn update_typing_users(&mut self, users: &[String]) {
        self.record(UiEvent::Typing(users.to_vec()));
    }

    fn collaboration_action(&mut self, envelope: &Value) {
        self.record(UiEvent::Collaboration(envelope.clone()));
    }
}
