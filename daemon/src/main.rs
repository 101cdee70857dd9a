//! ember daemon — entry point for running an ember node.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use ember_network::Broadcaster;
use ember_node::{tasks, Node, NodeConfig, ShutdownController};
use ember_rpc::RpcServer;
use ember_store::{FsStore, Snapshotter};
use ember_types::Clock;
use ember_utils::SystemClock;

mod demo;

/// Channel capacity for outbound frames.
const OUTBOUND_CHANNEL_CAPACITY: usize = 4096;

#[derive(Parser)]
#[command(name = "ember-daemon", about = "ember blockchain node daemon")]
struct Cli {
    /// Path to a TOML configuration file. File settings are the base; CLI
    /// flags override them.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Node identity on the gossip network.
    #[arg(long, env = "EMBER_NODE_ID")]
    node_id: Option<String>,

    /// Peer listener bind address, `host:port`.
    #[arg(long, env = "EMBER_LISTEN_ADDR")]
    listen_addr: Option<String>,

    /// Snapshot directory (omit to run in-memory only).
    #[arg(long, env = "EMBER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Disable the mining task.
    #[arg(long)]
    no_mine: bool,

    /// Enable the HTTP query surface.
    #[arg(long, env = "EMBER_ENABLE_RPC")]
    rpc: bool,

    /// RPC bind address.
    #[arg(long, env = "EMBER_RPC_ADDR")]
    rpc_addr: Option<String>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "EMBER_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a node until SIGINT/SIGTERM.
    Run,
    /// Spin up a local cluster over loopback TCP, trade, mine, and converge.
    Demo {
        /// Number of nodes in the cluster.
        #[arg(long, default_value_t = 3)]
        nodes: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => NodeConfig::from_toml_file(&path.display().to_string())?,
        None => NodeConfig::default(),
    };
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(listen_addr) = cli.listen_addr {
        config.listen_addr = listen_addr;
    }
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = Some(data_dir);
    }
    if cli.no_mine {
        config.enable_mining = false;
    }
    if cli.rpc {
        config.enable_rpc = true;
    }
    if let Some(rpc_addr) = cli.rpc_addr {
        config.rpc_addr = rpc_addr;
    }
    if let Some(log_level) = cli.log_level {
        config.log_level = log_level;
    }

    ember_utils::logging::init_tracing(&config.log_level, config.log_format == "json");

    match cli.command {
        Command::Run => run_node(config).await,
        Command::Demo { nodes } => demo::run(nodes, config.params).await,
    }
}

async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    // Startup persister faults are fatal: better to refuse than to fork the
    // cluster by mining on an unexpected fresh chain.
    let snapshotter: Option<Arc<dyn Snapshotter>> = match &config.data_dir {
        Some(dir) => Some(Arc::new(FsStore::open(dir.clone())?)),
        None => None,
    };

    let (inbound_tx, inbound_rx) = mpsc::channel(config.max_pending_transactions);
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);

    let node = Node::new(
        config.clone(),
        Arc::new(SystemClock) as Arc<dyn Clock>,
        Broadcaster::new(outbound_tx),
        snapshotter,
    )?;

    let shutdown = ShutdownController::new();

    // Transport: bind failure is fatal (nonzero exit), everything after is
    // best-effort.
    let (local_addr, listener_handle) =
        ember_network::spawn_listener(&config.listen_addr, inbound_tx).await?;
    let resolver = Arc::clone(&node);
    let writer_handle =
        ember_network::spawn_outbound_writer(outbound_rx, move |peer| resolver.resolve_peer(peer));

    let dispatcher = tasks::spawn_dispatcher(Arc::clone(&node), inbound_rx, shutdown.subscribe());
    let retry_timer = tasks::spawn_retry_timer(Arc::clone(&node), shutdown.subscribe());
    let miner = config.enable_mining.then(|| {
        tasks::spawn_miner(
            Arc::clone(&node),
            config.mine_interval_secs,
            shutdown.subscribe(),
        )
    });

    let rpc_handle = if config.enable_rpc {
        let (rpc_addr, handle) = RpcServer::new(Arc::clone(&node), config.rpc_addr.clone())
            .start(shutdown.subscribe())
            .await?;
        tracing::info!(%rpc_addr, "rpc enabled");
        Some(handle)
    } else {
        None
    };

    tracing::info!(
        node_id = %config.node_id,
        %local_addr,
        peers = config.peers.len(),
        mining = config.enable_mining,
        "ember node running"
    );

    // Introduce ourselves to the configured peers.
    node.announce().await;

    shutdown.wait_for_signal().await;

    // Orderly teardown: dispatcher drains its queue, miner and timers stop,
    // then one final snapshot flush.
    dispatcher.await?;
    retry_timer.await?;
    if let Some(miner) = miner {
        miner.await?;
    }
    if let Some(rpc_handle) = rpc_handle {
        rpc_handle.await?;
    }
    listener_handle.abort();
    writer_handle.abort();

    node.persist().await;
    tracing::info!("ember daemon exited cleanly");
    Ok(())
}
