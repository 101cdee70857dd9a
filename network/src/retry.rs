//! Bounded retry table for outbound request messages.
//!
//! Requests that expect a reply are tracked here until an `ACK` (or the
//! reply itself) clears them; a timer task re-sends whatever is overdue.
//! The table is bounded — overflow drops the oldest pending entry, never the
//! newest.

use ember_messages::Message;
use std::collections::{HashMap, VecDeque};

/// One tracked outbound message.
#[derive(Clone, Debug)]
struct PendingEntry {
    message: Message,
    target_peer: String,
    sent_at_secs: u64,
    retries: u32,
}

/// A message due for another send attempt.
#[derive(Clone, Debug)]
pub struct DueMessage {
    pub msg_id: String,
    pub message: Message,
    pub target_peer: String,
    pub attempt: u32,
}

/// Bounded map of un-acked outbound messages, keyed by correlation id.
pub struct PendingMessages {
    entries: HashMap<String, PendingEntry>,
    /// Insertion order, for oldest-first overflow drops.
    order: VecDeque<String>,
    max_size: usize,
    max_retries: u32,
    retry_timeout_secs: u64,
}

impl PendingMessages {
    pub fn new(max_size: usize, max_retries: u32, retry_timeout_secs: u64) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            max_size,
            max_retries,
            retry_timeout_secs,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Track an outbound message until acked.
    pub fn track(&mut self, msg_id: String, message: Message, target_peer: String, now_secs: u64) {
        while self.entries.len() >= self.max_size {
            if let Some(oldest) = self.order.pop_front() {
                if self.entries.remove(&oldest).is_some() {
                    tracing::warn!(msg_id = %oldest, "pending-message table full, dropped oldest");
                }
            } else {
                break;
            }
        }
        self.order.push_back(msg_id.clone());
        self.entries.insert(
            msg_id,
            PendingEntry {
                message,
                target_peer,
                sent_at_secs: now_secs,
                retries: 0,
            },
        );
    }

    /// Clear a tracked message; returns whether it was present.
    pub fn ack(&mut self, msg_id: &str) -> bool {
        self.entries.remove(msg_id).is_some()
    }

    /// Collect overdue messages for re-send, advancing their retry counts.
    ///
    /// Entries past the retry budget are dropped and reported via the
    /// returned `exhausted` list so the caller can penalize the peer.
    pub fn due(&mut self, now_secs: u64) -> (Vec<DueMessage>, Vec<String>) {
        let mut due = Vec::new();
        let mut exhausted = Vec::new();
        let retry_timeout_secs = self.retry_timeout_secs;
        let max_retries = self.max_retries;

        self.entries.retain(|msg_id, entry| {
            if now_secs < entry.sent_at_secs + retry_timeout_secs {
                return true;
            }
            if entry.retries >= max_retries {
                exhausted.push(entry.target_peer.clone());
                tracing::warn!(msg_id = %msg_id, peer = %entry.target_peer, "retry budget exhausted");
                return false;
            }
            entry.retries += 1;
            entry.sent_at_secs = now_secs;
            due.push(DueMessage {
                msg_id: msg_id.clone(),
                message: entry.message.clone(),
                target_peer: entry.target_peer.clone(),
                attempt: entry.retries,
            });
            true
        });

        // Drop order entries whose message was acked or retired so the
        // insertion log cannot grow without bound.
        self.order.retain(|id| self.entries.contains_key(id));

        (due, exhausted)
    }
}
