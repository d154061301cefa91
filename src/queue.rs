//! Bounded outbound message queue
//!
//! Holds messages that could not be sent immediately. Insertion order is
//! send order; when full, the oldest entry is discarded to make room.

use std::collections::VecDeque;

use tracing::warn;

use crate::message::OutboundMessage;

/// Bounded FIFO of outbound messages
#[derive(Debug)]
pub struct MessageQueue {
    items: VecDeque<OutboundMessage>,
    capacity: usize,
}

impl MessageQueue {
    /// Create an empty queue holding at most `capacity` messages
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a message, evicting the oldest one if the queue is full
    ///
    /// Returns the evicted message, if any.
    pub fn push(&mut self, msg: OutboundMessage) -> Option<OutboundMessage> {
        if self.capacity == 0 {
            warn!("Message queue has no capacity, dropping '{}'", msg.kind());
            return Some(msg);
        }

        let evicted = if self.items.len() >= self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        if let Some(old) = &evicted {
            warn!(
                "Message queue full ({}), dropped oldest '{}' message from {}",
                self.capacity,
                old.kind(),
                old.timestamp()
            );
        }

        self.items.push_back(msg);
        evicted
    }

    /// Take the oldest message
    pub fn pop(&mut self) -> Option<OutboundMessage> {
        self.items.pop_front()
    }

    /// Put a message back at the head (failed flush)
    pub fn push_front(&mut self, msg: OutboundMessage) {
        self.items.push_front(msg);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

}
