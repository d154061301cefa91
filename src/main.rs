//! Zeeky AI terminal chat client - Entry Point
//!
//! Connects to a room and turns stdin lines into chat messages.
//!
//! Usage: `zeeky_ws_client [server_url] [user_id] [room_id]`
//!
//! Commands: `/ai <text>`, `/join <room>`, `/typing`, `/info`, `/quit`.

use std::env;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use zeeky_ws_client::{
    AiReply, ChatClient, ChatEntry, ClientConfig, ClientHandle, EventHandlers, Presenter,
    RoomId, RoomUser, StatusLevel, UserId, WsTransport,
};

/// Prints everything the client surfaces to stdout
struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn show_status(&mut self, status: &str, level: StatusLevel) {
        println!("-- {} ({})", status, level);
    }

    fn show_notification(&mut self, text: &str, _level: StatusLevel) {
        println!("-- {}", text);
    }

    fn update_room_users(&mut self, users: &[RoomUser]) {
        let names: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
        println!("-- in room: {}", names.join(", "));
    }

    fn display_chat_message(&mut self, entry: &ChatEntry) {
        println!("[{}] {}", entry.user_id.as_deref().unwrap_or("?"), entry.content);
    }

    fn display_ai_response(&mut self, reply: &AiReply) {
        println!("[Zeeky AI] {}", reply.content);
    }

    fn update_typing_users(&mut self, users: &[String]) {
        if !users.is_empty() {
            println!("-- {} typing...", users.join(", "));
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=zeeky_ws_client=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("zeeky_ws_client=info")),
        )
        .init();

    // Environment first, positional arguments override
    let mut config = ClientConfig::from_env()?;
    let mut args = env::args().skip(1);
    if let Some(url) = args.next() {
        config.server_url = url;
    }
    let user_id = args.next().map(UserId);
    let room_id = args.next().map(RoomId);

    let (client, handle) = ChatClient::new(config, WsTransport, TerminalPresenter);
    let client_task = tokio::spawn(client.run());
    info!("ChatClient actor started");

    handle
        .set_event_handlers(
            EventHandlers::new().on_error(|e| error!("Client error: {}", e)),
        )
        .await?;
    handle.connect(user_id, room_id).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !handle_line(&handle, line.trim()).await? {
            break;
        }
    }

    handle.shutdown().await?;
    client_task.await?;
    Ok(())
}

/// Act on one input line; returns false when the user asked to quit
async fn handle_line(
    handle: &ClientHandle,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("", _) => {}
        ("/quit", _) => return Ok(false),
        ("/ai", prompt) if !prompt.is_empty() => {
            let (request_id, sent) = handle.send_ai_request(prompt, None).await?;
            if !sent {
                println!("-- queued {} until reconnected", request_id);
            }
        }
        ("/join", room) if !room.is_empty() => {
            handle.join_room(RoomId(room.to_string())).await?;
        }
        ("/typing", _) => handle.start_typing().await?,
        ("/info", _) => {
            let info = handle.connection_info().await?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        _ => {
            handle.stop_typing().await?;
            if !handle.send_chat_message(line).await? {
                println!("-- queued until reconnected");
            }
        }
    }
    Ok(true)
}
