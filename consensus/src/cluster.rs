//! A handle over the set of nodes the monitor drives.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ember_node::{Node, NodeStatus};

/// Read/repair access to every node in a cluster.
#[derive(Clone)]
pub struct Cluster {
    nodes: Vec<Arc<Node>>,
}

impl Cluster {
    pub fn new(nodes: Vec<Arc<Node>>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[Arc<Node>] {
        &self.nodes
    }

    pub fn node(&self, node_id: &str) -> Option<&Arc<Node>> {
        self.nodes.iter().find(|n| n.node_id() == node_id)
    }

    pub async fn statuses(&self) -> Vec<NodeStatus> {
        let mut statuses = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            statuses.push(node.status().await);
        }
        statuses
    }

    /// `node_id -> height` for every node.
    pub async fn heights(&self) -> BTreeMap<String, u64> {
        self.statuses()
            .await
            .into_iter()
            .map(|s| (s.node_id, s.height))
            .collect()
    }

    /// The greatest height any node holds.
    pub async fn network_height(&self) -> u64 {
        self.statuses()
            .await
            .iter()
            .map(|s| s.height)
            .max()
            .unwrap_or(0)
    }

    /// `node_id -> state root` for every node.
    pub async fn state_roots(&self) -> BTreeMap<String, String> {
        self.statuses()
            .await
            .into_iter()
            .map(|s| (s.node_id, s.state_root.to_hex()))
            .collect()
    }

    /// `node_id -> at network height` for every node.
    pub async fn sync_status(&self) -> BTreeMap<String, bool> {
        let statuses = self.statuses().await;
        let network_height = statuses.iter().map(|s| s.height).max().unwrap_or(0);
        statuses
            .into_iter()
            .map(|s| (s.node_id, s.height == network_height))
            .collect()
    }

    /// Whether heights span at most `max_height_diff`; with a zero span the
    /// tips must also agree.
    pub async fn is_network_synced(&self, max_height_diff: u64) -> bool {
        let statuses = self.statuses().await;
        if statuses.len() < 2 {
            return true;
        }
        let min = statuses.iter().map(|s| s.height).min().unwrap_or(0);
        let max = statuses.iter().map(|s| s.height).max().unwrap_or(0);
        if max - min > max_height_diff {
            return false;
        }
        max_height_diff > 0 || statuses.windows(2).all(|w| w[0].tip_hash == w[1].tip_hash)
    }

    /// Whether every node reports the same state root.
    pub async fn is_state_synced(&self) -> bool {
        let statuses = self.statuses().await;
        statuses
            .windows(2)
            .all(|w| w[0].state_root == w[1].state_root)
    }

    /// Poll until the cluster agrees on chain and state, or the timeout
    /// elapses. Returns whether agreement was reached. A monitor (or live
    /// gossip) must be running for this to ever turn true.
    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.is_network_synced(0).await && self.is_state_synced().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(?timeout, "cluster did not sync before the deadline");
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
