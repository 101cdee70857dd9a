//! Peer registry and scoring.

use std::collections::HashMap;

/// Reasons a peer gets penalized. Each carries a fixed penalty value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Penalty {
    InvalidBlock,
    InvalidTransaction,
    Timeout,
}

impl Penalty {
    /// Score delta (always negative).
    pub fn value(self) -> i32 {
        match self {
            Self::InvalidBlock => -100,
            Self::InvalidTransaction => -25,
            Self::Timeout => -10,
        }
    }
}

/// Per-peer metadata.
#[derive(Clone, Debug)]
pub struct PeerInfo {
    /// Dial address, `host:port`.
    pub address: String,
    /// Reputation score; starts at 0, only penalties move it for now.
    pub score: i32,
    pub last_seen_secs: u64,
}

/// Registry of known peers, `peer_id -> info`. Read-mostly; the node guards
/// it with its own lock.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: HashMap<String, PeerInfo>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Register or refresh a peer.
    pub fn add(&mut self, peer_id: impl Into<String>, address: impl Into<String>, now_secs: u64) {
        let peer_id = peer_id.into();
        let address = address.into();
        self.peers
            .entry(peer_id)
            .and_modify(|info| {
                info.address.clone_from(&address);
                info.last_seen_secs = now_secs;
            })
            .or_insert(PeerInfo {
                address,
                score: 0,
                last_seen_secs: now_secs,
            });
    }

    pub fn remove(&mut self, peer_id: &str) -> Option<PeerInfo> {
        self.peers.remove(peer_id)
    }

    pub fn get(&self, peer_id: &str) -> Option<&PeerInfo> {
        self.peers.get(peer_id)
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.peers.contains_key(peer_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.peers.keys().map(String::as_str)
    }

    /// `peer_id -> address` snapshot, for `PEER_LIST` payloads.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.peers
            .iter()
            .map(|(id, info)| (id.as_str(), info.address.as_str()))
    }

    /// Downgrade a peer's trust score. The hook exists so misbehaving peers
    /// can eventually be deprioritized; nothing disconnects on score yet.
    pub fn penalize(&mut self, peer_id: &str, penalty: Penalty) {
        if let Some(info) = self.peers.get_mut(peer_id) {
            info.score = info.score.saturating_add(penalty.value());
            tracing::debug!(peer = peer_id, score = info.score, ?penalty, "peer penalized");
        }
    }
}
