//! Client configuration
//!
//! Connection target, reconnect backoff, typing debounce and queue bounds.

use std::env;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::error::ClientError;
use crate::types::{RoomId, UserId};

/// Default server base URL
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:8000";

// Everything but RFC 3986 unreserved characters is escaped in ids
const PATH_SEGMENT_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Chat client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (`ws://`, `wss://`, `http://` or `https://`)
    pub server_url: String,
    /// Automatic reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Delay before the first reconnect attempt; doubles per attempt
    pub reconnect_delay: Duration,
    /// Time allowed for the opening handshake before it counts as failed
    pub open_timeout: Duration,
    /// Inactivity period after which typing is reported stopped
    pub typing_timeout: Duration,
    /// Maximum number of queued outbound messages
    pub queue_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            open_timeout: Duration::from_secs(10),
            typing_timeout: Duration::from_secs(3),
            queue_capacity: 50,
        }
    }
}

impl ClientConfig {
    /// Create a config for the given server URL with default settings
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Default::default()
        }
    }

    /// Build a config from `ZEEKY_WS_*` environment variables over the defaults
    ///
    /// Recognised: `ZEEKY_WS_URL`, `ZEEKY_WS_MAX_RECONNECTS`,
    /// `ZEEKY_WS_RECONNECT_DELAY_MS`, `ZEEKY_WS_OPEN_TIMEOUT_MS`,
    /// `ZEEKY_WS_TYPING_TIMEOUT_MS`, `ZEEKY_WS_QUEUE_CAPACITY`.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ClientError> {
        let mut config = Self::default();

        if let Some(url) = lookup("ZEEKY_WS_URL") {
            config.server_url = url;
        }
        if let Some(n) = parse_var::<u32>(&lookup, "ZEEKY_WS_MAX_RECONNECTS")? {
            config.max_reconnect_attempts = n;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "ZEEKY_WS_RECONNECT_DELAY_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "ZEEKY_WS_OPEN_TIMEOUT_MS")? {
            config.open_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, "ZEEKY_WS_TYPING_TIMEOUT_MS")? {
            config.typing_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "ZEEKY_WS_QUEUE_CAPACITY")? {
            config.queue_capacity = n;
        }

        Ok(config)
    }

    /// Set maximum automatic reconnect attempts
    pub fn max_reconnects(mut self, n: u32) -> Self {
        self.max_reconnect_attempts = n;
        self
    }

    /// Set the base reconnect delay
    pub fn reconnect_delay(mut self, d: Duration) -> Self {
        self.reconnect_delay = d;
        self
    }

    /// Set the opening handshake timeout
    pub fn open_timeout(mut self, d: Duration) -> Self {
        self.open_timeout = d;
        self
    }

    /// Set the typing inactivity timeout
    pub fn typing_timeout(mut self, d: Duration) -> Self {
        self.typing_timeout = d;
        self
    }

    /// Set the outbound queue capacity
    pub fn queue_capacity(mut self, n: usize) -> Self {
        self.queue_capacity = n;
        self
    }

    /// WebSocket endpoint for a user in a room: `<base>/ws/<user>/<room>`
    ///
    /// Both ids are percent-encoded as single path segments.
    pub fn endpoint(&self, user_id: &UserId, room_id: &RoomId) -> String {
        let base = self.server_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!(
            "{}/ws/{}/{}",
            base,
            utf8_percent_encode(user_id.as_str(), PATH_SEGMENT_ENCODE_SET),
            utf8_percent_encode(room_id.as_str(), PATH_SEGMENT_ENCODE_SET)
        )
    }

    /// Backoff delay for reconnect attempt `attempt` (1-based)
    pub fn reconnect_delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        self.reconnect_delay.saturating_mul(1u32 << exponent)
    }
}

fn parse_var<V: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<V>, ClientError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ClientError::Config(format!("{} has invalid value '{}'", key, raw))),
        None => Ok(None),
    }
}
