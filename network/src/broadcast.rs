//! Flood-based message broadcasting.
//!
//! The [`Broadcaster`] does not write to sockets. It pushes
//! `(peer_id, frame_bytes)` tuples onto an `mpsc` channel that the transport
//! layer drains, so the chain lock is never held across network I/O.

use ember_messages::{encode_frame, Message};
use tokio::sync::mpsc;

/// Outcome of a broadcast attempt.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Peers the frame was queued for.
    pub sent: usize,
    /// Peers for which queueing failed (channel full or closed).
    pub failed: usize,
}

/// Queue-based broadcaster.
#[derive(Clone)]
pub struct Broadcaster {
    outbound_tx: mpsc::Sender<(String, Vec<u8>)>,
}

impl Broadcaster {
    pub fn new(outbound_tx: mpsc::Sender<(String, Vec<u8>)>) -> Self {
        Self { outbound_tx }
    }

    /// Queue a frame for a single peer.
    pub fn send(&self, peer_id: &str, message: &Message) -> bool {
        self.outbound_tx
            .try_send((peer_id.to_string(), encode_frame(message)))
            .is_ok()
    }

    /// Queue a frame for every listed peer except `except`.
    ///
    /// `except` is the gossip origin: relaying a message back to whoever sent
    /// it only wastes a round trip.
    pub fn broadcast_except<'a>(
        &self,
        message: &Message,
        peer_ids: impl IntoIterator<Item = &'a str>,
        except: Option<&str>,
    ) -> BroadcastResult {
        let frame = encode_frame(message);
        let mut result = BroadcastResult::default();
        for peer_id in peer_ids {
            if Some(peer_id) == except {
                continue;
            }
            match self.outbound_tx.try_send((peer_id.to_string(), frame.clone())) {
                Ok(()) => result.sent += 1,
                Err(_) => result.failed += 1,
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_messages::MessageKind;

    fn message() -> Message {
        Message::new(MessageKind::SyncRequest, "origin", &serde_json::json!({}))
    }

    #[tokio::test]
    async fn broadcast_skips_origin() {
        let (tx, mut rx) = mpsc::channel(16);
        let broadcaster = Broadcaster::new(tx);

        let peers = ["node-a", "node-b", "node-c"];
        let result = broadcaster.broadcast_except(&message(), peers, Some("node-b"));
        assert_eq!(result, BroadcastResult { sent: 2, failed: 0 });

        let (first, _) = rx.recv().await.unwrap();
        let (second, _) = rx.recv().await.unwrap();
        assert_ne!(first, "node-b");
        assert_ne!(second, "node-b");
    }

    #[tokio::test]
    async fn full_channel_counts_failures() {
        let (tx, _rx) = mpsc::channel(1);
        let broadcaster = Broadcaster::new(tx);
        let peers = ["node-a", "node-b", "node-c"];
        let result = broadcaster.broadcast_except(&message(), peers, None);
        assert_eq!(result.sent + result.failed, 3);
        assert!(result.failed > 0);
    }

    #[tokio::test]
    async fn frames_are_newline_terminated() {
        let (tx, mut rx) = mpsc::channel(4);
        let broadcaster = Broadcaster::new(tx);
        assert!(broadcaster.send("node-a", &message()));
        let (_, frame) = rx.recv().await.unwrap();
        assert_eq!(*frame.last().unwrap(), b'\n');
    }
}
