//! The consensus monitor loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use ember_node::{Node, NodeStatus};

use crate::cluster::Cluster;

/// What one reconciliation pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub leader_id: String,
    pub leader_height: u64,
    /// Followers brought onto the leader's chain this tick.
    pub synced: Vec<String>,
    /// Followers whose suffix adoption failed (retried next tick).
    pub failed: Vec<String>,
    /// Nodes whose state root disagreed with the leader despite an equal
    /// chain.
    pub divergent: Vec<String>,
    /// Divergent nodes repaired from the leader's snapshot.
    pub repaired: Vec<String>,
}

/// Cluster-wide driver: pulls every node toward the longest chain, then
/// cross-checks state roots.
pub struct ConsensusMonitor {
    cluster: Cluster,
    /// Whether state divergence is repaired by snapshot adoption or only
    /// surfaced.
    repair_state: bool,
}

impl ConsensusMonitor {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            repair_state: true,
        }
    }

    /// Report divergences without adopting the leader's snapshot.
    pub fn report_only(cluster: Cluster) -> Self {
        Self {
            cluster,
            repair_state: false,
        }
    }

    /// Elect the leader: greatest height, ties to the lexicographically
    /// smallest tip hash.
    fn elect<'a>(statuses: &'a [NodeStatus]) -> Option<&'a NodeStatus> {
        statuses
            .iter()
            .max_by(|a, b| {
                a.height
                    .cmp(&b.height)
                    // Reversed: for equal heights the *smaller* hash wins.
                    .then_with(|| b.tip_hash.cmp(&a.tip_hash))
            })
    }

    /// One reconciliation pass.
    pub async fn tick(&self) -> TickReport {
        let statuses = self.cluster.statuses().await;
        let Some(leader_status) = Self::elect(&statuses) else {
            return TickReport::default();
        };
        let leader_status = leader_status.clone();
        let Some(leader) = self.cluster.node(&leader_status.node_id) else {
            return TickReport::default();
        };
        let leader = Arc::clone(leader);

        let mut report = TickReport {
            leader_id: leader_status.node_id.clone(),
            leader_height: leader_status.height,
            ..TickReport::default()
        };

        // ── Chain reconciliation ───────────────────────────────────────
        for status in &statuses {
            if status.node_id == leader_status.node_id {
                continue;
            }
            if status.height == leader_status.height && status.tip_hash == leader_status.tip_hash {
                continue;
            }
            let Some(follower) = self.cluster.node(&status.node_id) else {
                continue;
            };

            match self.reconcile(&leader, follower, status).await {
                Ok(()) => report.synced.push(status.node_id.clone()),
                Err(reason) => {
                    tracing::warn!(
                        follower = %status.node_id,
                        leader = %leader_status.node_id,
                        %reason,
                        "chain reconciliation failed"
                    );
                    report.failed.push(status.node_id.clone());
                }
            }
        }

        // ── State cross-check ──────────────────────────────────────────
        let leader_root = leader.state_root().await;
        let leader_tip = leader.tip_hash().await;
        for node in self.cluster.nodes() {
            if node.node_id() == leader_status.node_id {
                continue;
            }
            if node.tip_hash().await != leader_tip {
                continue; // chain still catching up; roots not comparable
            }
            let root = node.state_root().await;
            if root == leader_root {
                continue;
            }

            // Determinism says equal chains imply equal roots; this is a
            // bug, an out-of-band mutation, or mismatched genesis state.
            tracing::warn!(
                node = node.node_id(),
                ours = %root,
                leader = %leader_root,
                "state divergence despite equal chains"
            );
            report.divergent.push(node.node_id().to_string());

            if self.repair_state {
                let snapshot = leader.account_table().await;
                node.replace_state(snapshot).await;
                let healed = node.state_root().await == leader_root;
                if healed {
                    tracing::info!(node = node.node_id(), "state repaired from leader snapshot");
                    report.repaired.push(node.node_id().to_string());
                } else {
                    tracing::error!(node = node.node_id(), "state repair did not converge");
                }
            }
        }

        report
    }

    /// Bring one follower onto the leader's chain.
    ///
    /// Walks back from `min(follower.height, leader.height)` comparing hashes
    /// per height until they agree, then replaces the follower's suffix above
    /// that point. Hash walk instead of plain height comparison: a follower
    /// holding a competing block at the same height as the leader's would
    /// otherwise never converge.
    async fn reconcile(
        &self,
        leader: &Arc<Node>,
        follower: &Arc<Node>,
        follower_status: &NodeStatus,
    ) -> Result<(), String> {
        let leader_height = leader.height().await;
        let mut common = follower_status.height.min(leader_height);
        while common > 0 {
            let ours = follower.hash_at(common).await;
            let theirs = leader.hash_at(common).await;
            if ours.is_some() && ours == theirs {
                break;
            }
            common -= 1;
        }
        if common == 0 {
            // Not even genesis matches: the nodes are on different networks.
            // No reorganization can fix that; report it to the operator.
            return Err("no common prefix with leader (genesis mismatch)".into());
        }

        let suffix = leader.suffix_from(common).await;
        tracing::debug!(
            follower = follower.node_id(),
            leader = leader.node_id(),
            common,
            blocks = suffix.len(),
            "pulling leader suffix"
        );
        follower
            .replace_suffix(common, suffix)
            .await
            .map_err(|e| e.to_string())
    }

    /// Spawn the periodic loop.
    pub fn spawn(self, tick_interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    biased;
                    _ = shutdown_rx.recv() => {
                        tracing::info!("consensus monitor shut down");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.tick().await;
                        if !report.synced.is_empty() || !report.divergent.is_empty() {
                            tracing::info!(
                                leader = %report.leader_id,
                                height = report.leader_height,
                                synced = report.synced.len(),
                                divergent = report.divergent.len(),
                                "consensus tick"
                            );
                        }
                    }
                }
            }
        })
    }
}
