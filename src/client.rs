//! ChatClient actor implementation
//!
//! The single owner of connection state: identity, the live transport link,
//! the outbound queue, typing state and the local room view. Commands from
//! [`ClientHandle`]s and internal signals (transport events, timer firings)
//! are processed one at a time on one task, so no locks are needed.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{ConnectEvent, DisconnectEvent, DisconnectReason, EventHandlers};
use crate::handle::ClientHandle;
use crate::message::{backlog_entries, BacklogEntry, ClientMessage, OutboundMessage, ServerMessage};
use crate::presenter::{Presenter, StatusLevel};
use crate::queue::MessageQueue;
use crate::room::{RoomState, RoomUser};
use crate::transport::{ConnectionEvents, Transport, TransportEvent};
use crate::types::{ConnectionId, RoomId, UserId};

/// Channel buffer size for client commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Commands sent from handles to the ChatClient actor
#[derive(Debug)]
pub enum ClientCommand {
    /// Open a connection, optionally switching identity
    Connect {
        user_id: Option<UserId>,
        room_id: Option<RoomId>,
    },
    /// Close the connection without reconnecting
    Disconnect,
    /// Send or queue a message; replies whether it was sent immediately
    Send {
        message: OutboundMessage,
        reply: oneshot::Sender<bool>,
    },
    StartTyping,
    StopTyping,
    /// Replace all callback slots
    SetEventHandlers { handlers: EventHandlers },
    /// Snapshot of the connection
    Info { reply: oneshot::Sender<ConnectionInfo> },
    /// Disconnect and stop the actor
    Shutdown,
}

/// Signals produced inside the client: transport events and timer firings
#[derive(Debug)]
pub(crate) enum Signal {
    /// A connection attempt failed before opening
    OpenFailed { generation: u64, error: ClientError },
    /// Event from the connection with the given generation
    Transport {
        generation: u64,
        event: TransportEvent,
    },
    /// Backoff delay elapsed
    ReconnectDue { generation: u64 },
    /// Typing inactivity timeout elapsed
    TypingIdle { token: u64 },
}

/// Connection snapshot
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub is_connected: bool,
    pub state: ConnectionState,
    pub user_id: UserId,
    pub room_id: RoomId,
    pub connection_id: Option<ConnectionId>,
    pub reconnect_attempts: u32,
    pub queued_messages: usize,
    pub room_users: Vec<RoomUser>,
    pub typing_users: Vec<String>,
}

/// Live link to the transport's writer
#[derive(Debug)]
struct Link {
    generation: u64,
    outbound: mpsc::UnboundedSender<String>,
}

/// Local typing indicator with its inactivity timer
#[derive(Debug, Default)]
struct TypingState {
    is_typing: bool,
    /// Identifies the pending timer; bumped on every cancel
    token: u64,
    timer: Option<JoinHandle<()>>,
}

/// The chat client actor
pub struct ChatClient<T: Transport> {
    config: ClientConfig,
    transport: Arc<T>,
    presenter: Box<dyn Presenter>,
    handlers: EventHandlers,
    state: ConnectionState,
    user_id: UserId,
    room: RoomState,
    connection_id: Option<ConnectionId>,
    reconnect_attempts: u32,
    /// Bumped on every connect and disconnect; events carrying an older
    /// generation belong to a connection that has been abandoned
    generation: u64,
    link: Option<Link>,
    url: String,
    queue: MessageQueue,
    typing: TypingState,
    /// In-flight `Transport::open` call
    open_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
    commands: mpsc::Receiver<ClientCommand>,
    signals: mpsc::UnboundedReceiver<Signal>,
    signal_tx: mpsc::UnboundedSender<Signal>,
}

impl<T: Transport> ChatClient<T> {
    /// Create a disconnected client with a random user id in the default room
    ///
    /// Returns the actor and a handle for sending it commands. The actor
    /// does nothing until driven by [`ChatClient::run`] or [`ChatClient::step`].
    pub fn new(
        config: ClientConfig,
        transport: T,
        presenter: impl Presenter,
    ) -> (Self, ClientHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let queue = MessageQueue::new(config.queue_capacity);

        let client = Self {
            config,
            transport: Arc::new(transport),
            presenter: Box::new(presenter),
            handlers: EventHandlers::default(),
            state: ConnectionState::Disconnected,
            user_id: UserId::generate(),
            room: RoomState::default(),
            connection_id: None,
            reconnect_attempts: 0,
            generation: 0,
            link: None,
            url: String::new(),
            queue,
            typing: TypingState::default(),
            open_task: None,
            reconnect_timer: None,
            commands: cmd_rx,
            signals: signal_rx,
            signal_tx,
        };
        (client, ClientHandle::new(cmd_tx))
    }

    /// Run the client event loop
    ///
    /// Processes commands and signals until shutdown or until every handle
    /// is dropped, then disconnects.
    pub async fn run(mut self) {
        info!("ChatClient started for {}", self.user_id);

        while self.step().await {}

        self.disconnect();
        info!("ChatClient shutting down");
    }

    /// Wait for and process exactly one command or signal
    ///
    /// Returns false once the client should stop.
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            biased;
            Some(signal) = self.signals.recv() => {
                self.handle_signal(signal);
                true
            }
            cmd = self.commands.recv() => match cmd {
                Some(ClientCommand::Shutdown) | None => false,
                Some(cmd) => {
                    self.handle_command(cmd);
                    true
                }
            },
        }
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: ClientCommand) {
        match cmd {
            ClientCommand::Connect { user_id, room_id } => self.connect(user_id, room_id),
            ClientCommand::Disconnect => self.disconnect(),
            ClientCommand::Send { message, reply } => {
                let sent = self.send(message);
                let _ = reply.send(sent);
            }
            ClientCommand::StartTyping => self.start_typing(),
            ClientCommand::StopTyping => self.stop_typing(),
            ClientCommand::SetEventHandlers { handlers } => self.set_event_handlers(handlers),
            ClientCommand::Info { reply } => {
                let _ = reply.send(self.connection_info());
            }
            // Handled by step()
            ClientCommand::Shutdown => {}
        }
    }

    /// Process a single internal signal
    fn handle_signal(&mut self, signal: Signal) {
        match signal {
            Signal::OpenFailed { generation, error } => {
                if self.is_current(generation) {
                    self.handle_open_failed(error);
                } else {
                    debug!("Ignoring open failure of stale connection {}", generation);
                }
            }
            Signal::Transport { generation, event } => {
                if !self.is_current(generation) {
                    debug!("Ignoring event from stale connection {}", generation);
                    return;
                }
                match event {
                    TransportEvent::Opened => self.handle_open(),
                    TransportEvent::Message(text) => self.handle_message(&text),
                    TransportEvent::Error(err) => self.handle_transport_error(err),
                    TransportEvent::Closed(reason) => {
                        self.handle_close(DisconnectReason::Closed(reason))
                    }
                }
            }
            Signal::ReconnectDue { generation } => {
                if generation == self.generation && self.state == ConnectionState::Reconnecting {
                    self.reconnect_timer = None;
                    self.open_connection();
                }
            }
            Signal::TypingIdle { token } => {
                if token == self.typing.token {
                    self.typing.timer = None;
                    debug!("Typing inactivity timeout");
                    self.stop_typing();
                }
            }
        }
    }

    /// Open a connection, replacing identity fields that are given
    ///
    /// Any existing connection is abandoned and the reconnect counter is
    /// reset. Completion is reported asynchronously.
    pub fn connect(&mut self, user_id: Option<UserId>, room_id: Option<RoomId>) {
        if let Some(user_id) = user_id {
            self.user_id = user_id;
        }
        if let Some(room_id) = room_id {
            self.room.enter(room_id);
        }
        self.reconnect_attempts = 0;
        self.open_connection();
    }

    /// Start a connection attempt for the current identity
    fn open_connection(&mut self) {
        self.cancel_reconnect();
        self.cancel_open();
        if self.link.take().is_some() {
            debug!("Abandoning previous connection");
        }

        self.generation += 1;
        let generation = self.generation;
        let url = self.config.endpoint(&self.user_id, &self.room.room_id);
        info!("Connecting to WebSocket: {}", url);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.link = Some(Link {
            generation,
            outbound: outbound_tx,
        });
        self.url = url.clone();
        self.state = ConnectionState::Connecting;

        let transport = Arc::clone(&self.transport);
        let events = ConnectionEvents::new(generation, self.signal_tx.clone());
        let signal_tx = self.signal_tx.clone();
        let open_timeout = self.config.open_timeout;
        self.open_task = Some(tokio::spawn(async move {
            let result = match timeout(open_timeout, transport.open(&url, outbound_rx, events)).await
            {
                Ok(result) => result,
                Err(_) => Err(ClientError::TransportOpen(format!(
                    "no handshake response within {}ms",
                    open_timeout.as_millis()
                ))),
            };
            if let Err(error) = result {
                let _ = signal_tx.send(Signal::OpenFailed { generation, error });
            }
        }));
    }

    /// Close the connection without scheduling a reconnect
    ///
    /// Queued messages are kept for the next connection.
    pub fn disconnect(&mut self) {
        self.cancel_reconnect();
        self.cancel_open();
        self.reset_typing();
        self.generation += 1;

        let had_link = self.link.take().is_some();
        self.state = ConnectionState::Disconnected;
        self.connection_id = None;
        self.room.clear();

        if had_link {
            info!("WebSocket disconnected by request");
            self.handlers.disconnect(&DisconnectEvent {
                reason: DisconnectReason::Requested,
            });
            self.presenter.show_status("Disconnected", StatusLevel::Info);
        }
    }

    /// Send a message envelope of the given type
    ///
    /// Returns true if it was handed to the transport, false if it was queued.
    pub fn send_message(&mut self, kind: impl Into<String>, data: Value) -> bool {
        self.send(OutboundMessage::new(kind, data))
    }

    /// Send a prepared message, queueing it when it cannot go out now
    ///
    /// `true` means the message reached the connection's writer, not the
    /// server. If the peer has already gone away and the close has not been
    /// processed yet, the message is lost with the connection.
    pub fn send(&mut self, message: impl Into<OutboundMessage>) -> bool {
        let message = message.into();

        if self.state != ConnectionState::Connected {
            debug!("Not connected, queueing '{}' message", message.kind());
            self.queue.push(message);
            return false;
        }

        match self.transmit(&message) {
            Ok(()) => true,
            Err(e) => {
                error!("Error sending WebSocket message: {}", e);
                self.handlers.error(&e);
                self.queue.push(message);
                false
            }
        }
    }

    /// Hand one message to the live link
    fn transmit(&self, message: &OutboundMessage) -> Result<(), ClientError> {
        let link = self
            .link
            .as_ref()
            .ok_or_else(|| ClientError::TransportSend("no open connection".to_string()))?;
        let json = message.to_json()?;
        link.outbound
            .send(json)
            .map_err(|_| ClientError::TransportSend("connection writer closed".to_string()))
    }

    /// Send queued messages oldest first, stopping at the first failure
    fn flush_queue(&mut self) {
        if !self.queue.is_empty() {
            debug!("Sending {} queued messages", self.queue.len());
        }
        while let Some(message) = self.queue.pop() {
            if let Err(e) = self.transmit(&message) {
                warn!("Queue flush interrupted: {}", e);
                self.queue.push_front(message);
                self.handlers.error(&e);
                break;
            }
        }
    }

    /// Mark the user as typing and (re)start the inactivity timer
    pub fn start_typing(&mut self) {
        if !self.typing.is_typing {
            self.typing.is_typing = true;
            self.send(ClientMessage::TypingStart);
        }

        self.cancel_typing_timer();
        let token = self.typing.token;
        let timeout = self.config.typing_timeout;
        let signal_tx = self.signal_tx.clone();
        self.typing.timer = Some(tokio::spawn(async move {
            sleep(timeout).await;
            let _ = signal_tx.send(Signal::TypingIdle { token });
        }));
    }

    /// Mark the user as no longer typing
    pub fn stop_typing(&mut self) {
        if self.typing.is_typing {
            self.typing.is_typing = false;
            self.send(ClientMessage::TypingStop);
        }
        self.cancel_typing_timer();
    }

    /// Replace all callback slots
    pub fn set_event_handlers(&mut self, handlers: EventHandlers) {
        self.handlers = handlers;
    }

    /// Handle a raw inbound frame
    ///
    /// Unparsable frames are logged and dropped. Everything else is
    /// dispatched by type and then passed to `on_message`.
    pub fn handle_message(&mut self, raw: &str) {
        let envelope: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!("Error parsing WebSocket message: {}", e);
                return;
            }
        };

        debug!("Received WebSocket message: {}", envelope);
        self.dispatch(&envelope);
        self.handlers.message(&envelope);
    }

    fn dispatch(&mut self, envelope: &Value) {
        let msg = match serde_json::from_value::<ServerMessage>(envelope.clone()) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Unrecognized message {:?}: {}", envelope.get("type"), e);
                return;
            }
        };

        match msg {
            ServerMessage::Welcome {
                connection_id,
                room_id,
                room_users,
                recent_messages,
            } => {
                info!("Welcome to room: {}", room_id);
                self.connection_id = Some(ConnectionId(connection_id));
                self.update_room_users(room_users);
                self.display_recent(&recent_messages);
            }
            ServerMessage::ChatMessage(entry) => {
                self.presenter.display_chat_message(&entry);
            }
            ServerMessage::AiResponse(reply) => {
                self.presenter.display_ai_response(&reply);
            }
            ServerMessage::AiError { request_id, error } => {
                warn!("AI request {:?} failed: {}", request_id, error);
                self.presenter
                    .show_notification(&format!("AI request failed: {}", error), StatusLevel::Error);
            }
            ServerMessage::UserJoined {
                user_id,
                room_users,
            } => {
                self.presenter
                    .show_notification(&format!("{} joined the room", user_id), StatusLevel::Info);
                self.update_room_users(room_users);
            }
            ServerMessage::UserLeft {
                user_id,
                room_users,
            } => {
                self.presenter
                    .show_notification(&format!("{} left the room", user_id), StatusLevel::Info);
                self.update_room_users(room_users);
            }
            ServerMessage::TypingUpdate { typing_users } => {
                self.room.set_typing(typing_users);
                self.presenter.update_typing_users(&self.room.typing_users);
            }
            ServerMessage::CollaborationAction => {
                self.presenter.collaboration_action(envelope);
            }
            ServerMessage::RoomChanged {
                room_id,
                room_users,
                recent_messages,
            } => {
                info!("Moved to room: {}", room_id);
                self.room.enter(RoomId(room_id));
                self.update_room_users(room_users);
                self.display_recent(&recent_messages);
            }
            ServerMessage::Unknown => {
                debug!("Unknown message type: {:?}", envelope.get("type"));
            }
        }
    }

    fn update_room_users(&mut self, users: Vec<RoomUser>) {
        self.room.set_users(users);
        debug!(
            "{} users in room {}",
            self.room.participant_count(),
            self.room.room_id
        );
        self.presenter.update_room_users(&self.room.users);
    }

    fn display_recent(&mut self, recent: &[Value]) {
        for entry in backlog_entries(recent) {
            match entry {
                BacklogEntry::Chat(entry) => self.presenter.display_chat_message(&entry),
                BacklogEntry::Ai(reply) => self.presenter.display_ai_response(&reply),
            }
        }
    }

    fn handle_open(&mut self) {
        info!("WebSocket connected");
        self.state = ConnectionState::Connected;
        self.reconnect_attempts = 0;

        self.flush_queue();

        let event = ConnectEvent {
            url: self.url.clone(),
            user_id: self.user_id.clone(),
            room_id: self.room.room_id.clone(),
        };
        self.handlers.connect(&event);
        self.presenter.show_status("Connected", StatusLevel::Success);
    }

    fn handle_transport_error(&mut self, err: ClientError) {
        error!("WebSocket error: {}", err);
        self.handlers.error(&err);
        self.presenter.show_status("Connection Error", StatusLevel::Error);
    }

    fn handle_open_failed(&mut self, err: ClientError) {
        error!("Failed to open WebSocket connection: {}", err);
        self.handlers.error(&err);
        self.presenter.show_status("Connection Failed", StatusLevel::Error);
        self.handle_close(DisconnectReason::OpenFailed);
    }

    fn handle_close(&mut self, reason: DisconnectReason) {
        info!("WebSocket disconnected: {:?}", reason);
        self.link = None;
        self.state = ConnectionState::Disconnected;
        self.connection_id = None;
        self.reset_typing();
        self.room.clear();

        self.handlers.disconnect(&DisconnectEvent { reason });
        self.presenter.show_status("Disconnected", StatusLevel::Error);

        self.schedule_reconnect();
    }

    /// Schedule the next automatic attempt with exponential backoff
    fn schedule_reconnect(&mut self) {
        self.reconnect_attempts += 1;
        let attempt = self.reconnect_attempts;
        let max = self.config.max_reconnect_attempts;

        if attempt > max {
            warn!("Giving up after {} reconnect attempts", max);
            self.state = ConnectionState::Disconnected;
            self.handlers
                .error(&ClientError::ReconnectExhausted { attempts: max });
            self.presenter
                .show_status("Disconnected (reconnect attempts exhausted)", StatusLevel::Error);
            return;
        }

        let delay = self.config.reconnect_delay_for(attempt);
        info!(
            "Reconnecting in {}ms (attempt {}/{})",
            delay.as_millis(),
            attempt,
            max
        );
        self.state = ConnectionState::Reconnecting;
        self.presenter.show_status(
            &format!("Reconnecting in {}s...", delay.as_secs_f64()),
            StatusLevel::Warning,
        );

        let generation = self.generation;
        let signal_tx = self.signal_tx.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            sleep(delay).await;
            let _ = signal_tx.send(Signal::ReconnectDue { generation });
        }));
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
    }

    fn cancel_open(&mut self) {
        if let Some(task) = self.open_task.take() {
            task.abort();
        }
    }

    fn cancel_typing_timer(&mut self) {
        if let Some(timer) = self.typing.timer.take() {
            timer.abort();
        }
        self.typing.token += 1;
    }

    /// Drop typing state without telling the server (connection is gone)
    fn reset_typing(&mut self) {
        self.typing.is_typing = false;
        self.cancel_typing_timer();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link
            .as_ref()
            .is_some_and(|link| link.generation == generation)
    }

    /// Connection snapshot
    pub fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            is_connected: self.is_connected(),
            state: self.state,
            user_id: self.user_id.clone(),
            room_id: self.room.room_id.clone(),
            connection_id: self.connection_id.clone(),
            reconnect_attempts: self.reconnect_attempts,
            queued_messages: self.queue.len(),
            room_users: self.room.users.clone(),
            typing_users: self.room.typing_users.clone(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn is_typing(&self) -> bool {
        self.typing.is_typing
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn room(&self) -> &RoomState {
        &self.room
    }
}
