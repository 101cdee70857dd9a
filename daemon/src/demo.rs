//! Local cluster demo: N nodes over loopback TCP, a funded account, a few
//! transfers, competing miners, and the consensus monitor pulling everyone
//! onto one chain.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use ember_consensus::{Cluster, ConsensusMonitor};
use ember_crypto::{derive_address, keypair_from_seed};
use ember_ledger::Transaction;
use ember_network::Broadcaster;
use ember_node::{tasks, Node, NodeConfig, ShutdownController};
use ember_types::{Address, Amount, ChainParams, Clock, Timestamp};
use ember_utils::SystemClock;

const CHANNEL_CAPACITY: usize = 1024;

struct DemoNode {
    node: Arc<Node>,
    handles: Vec<JoinHandle<()>>,
}

pub async fn run(count: usize, mut params: ChainParams) -> anyhow::Result<()> {
    let count = count.max(2);
    let clock = Arc::new(SystemClock);

    // Fast reconciliation so the demo converges within seconds.
    params.consensus_tick_ms = 500;

    // One funded account, allocated at genesis so every node agrees on it.
    let wallet = keypair_from_seed(&[42u8; 32]);
    let wallet_addr = derive_address(&wallet.public);
    params
        .genesis_accounts
        .insert(wallet_addr.clone(), Amount::new(1_000_000));

    // Bind every listener first so peer tables can carry real dial
    // addresses from the start.
    let mut inbound_rxs = Vec::new();
    let mut listen_addrs = Vec::new();
    let mut listener_handles = Vec::new();
    for _ in 0..count {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let (addr, handle) = ember_network::spawn_listener("127.0.0.1:0", tx).await?;
        inbound_rxs.push(rx);
        listen_addrs.push(addr.to_string());
        listener_handles.push(handle);
    }

    let shutdown = ShutdownController::new();
    let mut demo_nodes = Vec::new();

    for (i, inbound_rx) in inbound_rxs.into_iter().enumerate() {
        let node_id = format!("node-{}", i + 1);
        let peers: BTreeMap<String, String> = (0..count)
            .filter(|&j| j != i)
            .map(|j| (format!("node-{}", j + 1), listen_addrs[j].clone()))
            .collect();

        let config = NodeConfig {
            node_id: node_id.clone(),
            listen_addr: listen_addrs[i].clone(),
            peers,
            enable_mining: false,
            params: params.clone(),
            ..NodeConfig::default()
        };

        let (outbound_tx, outbound_rx) = mpsc::channel(CHANNEL_CAPACITY);
        let node = Node::new(
            config,
            clock.clone() as Arc<dyn Clock>,
            Broadcaster::new(outbound_tx),
            None,
        )?;

        let resolver = Arc::clone(&node);
        let writer =
            ember_network::spawn_outbound_writer(outbound_rx, move |p| resolver.resolve_peer(p));
        let dispatcher =
            tasks::spawn_dispatcher(Arc::clone(&node), inbound_rx, shutdown.subscribe());
        let retry = tasks::spawn_retry_timer(Arc::clone(&node), shutdown.subscribe());

        demo_nodes.push(DemoNode {
            node,
            handles: vec![writer, dispatcher, retry],
        });
    }

    for demo_node in &demo_nodes {
        demo_node.node.announce().await;
    }
    tokio::time::sleep(Duration::from_millis(300)).await;

    let cluster = Cluster::new(demo_nodes.iter().map(|d| Arc::clone(&d.node)).collect());
    let monitor_handle = ConsensusMonitor::new(cluster.clone()).spawn(
        Duration::from_millis(params.consensus_tick_ms),
        shutdown.subscribe(),
    );

    tracing::info!(nodes = count, wallet = %wallet_addr, "demo cluster up");

    // A few transfers submitted at node-1, gossiped everywhere.
    for nonce in 0..3u64 {
        let tx = Transaction::new_signed(
            &wallet,
            Address::new(format!("0xdemo{nonce}")),
            Amount::new(100 + nonce),
            Amount::new(1),
            nonce,
            Timestamp::from_epoch_secs(clock.now_secs()),
        );
        // One pending transaction per sender: mine between submissions.
        if let Err(e) = demo_nodes[0].node.submit_local(tx).await {
            tracing::warn!(error = %e, "demo submission rejected");
            continue;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Alternate miners so different nodes extend the chain.
        let miner = &demo_nodes[nonce as usize % count].node;
        // Respect the minimum block-time gap.
        tokio::time::sleep(Duration::from_millis(
            params.min_block_time_secs.max(1) * 1000 + 200,
        ))
        .await;
        match miner.mine_once().await {
            Ok(block) => {
                tracing::info!(miner = miner.node_id(), height = block.index, "demo block mined");
            }
            Err(e) => tracing::warn!(miner = miner.node_id(), error = %e, "demo mining failed"),
        }
    }

    if cluster.wait_for_sync(Duration::from_secs(15)).await {
        tracing::info!("cluster converged");
    } else {
        tracing::warn!("cluster did not converge inside the demo window");
    }

    for (node_id, height) in cluster.heights().await {
        tracing::info!(%node_id, height, "final height");
    }
    for (node_id, root) in cluster.state_roots().await {
        tracing::info!(%node_id, root = %&root[..16], "final state root");
    }
    let balance = demo_nodes[0].node.balance(&wallet_addr).await;
    tracing::info!(wallet = %wallet_addr, %balance, "wallet after transfers");

    shutdown.shutdown();
    monitor_handle.await?;
    for demo_node in demo_nodes {
        for handle in demo_node.handles {
            handle.abort();
        }
    }
    for handle in listener_handles {
        handle.abort();
    }
    tracing::info!("demo finished");
    Ok(())
}
