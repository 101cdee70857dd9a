//! Background tasks: inbound dispatch, mining, retry timer.
//!
//! Every task `select!`s on the shutdown channel; the daemon joins the
//! handles after triggering shutdown, then flushes a final snapshot.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use ember_messages::Message;

use crate::node::Node;

/// Spawn the inbound dispatcher: one message at a time into the node.
pub fn spawn_dispatcher(
    node: Arc<Node>,
    mut inbound_rx: mpsc::Receiver<(Message, String)>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    // Drain whatever is already queued before stopping.
                    while let Ok((message, remote)) = inbound_rx.try_recv() {
                        node.receive(message, &remote).await;
                    }
                    tracing::info!(node = node.node_id(), "dispatcher shut down");
                    break;
                }
                received = inbound_rx.recv() => {
                    match received {
                        Some((message, remote)) => node.receive(message, &remote).await,
                        None => break,
                    }
                }
            }
        }
    })
}

/// Spawn the mining loop: whenever the mempool has work, mine one block.
pub fn spawn_miner(
    node: Arc<Node>,
    interval_secs: u64,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    tracing::info!(node = node.node_id(), "miner shut down");
                    break;
                }
                _ = ticker.tick() => {
                    if node.mempool_len().await == 0 {
                        continue;
                    }
                    if let Err(e) = node.mine_once().await {
                        tracing::warn!(node = node.node_id(), error = %e, "mining attempt failed");
                    }
                }
            }
        }
    })
}

/// Spawn the retry timer: re-send overdue tracked messages once per second.
pub fn spawn_retry_timer(
    node: Arc<Node>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => break,
                _ = ticker.tick() => node.retry_tick().await,
            }
        }
    })
}
