//! Node configuration with TOML file support.

use crate::error::NodeError;
use ember_types::ChainParams;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Configuration for one ember node.
///
/// Loaded from a TOML file via [`NodeConfig::from_toml_file`] or built
/// programmatically (e.g. for tests). The nested [`ChainParams`] must match
/// across every node of a cluster; the per-node fields may differ freely.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodeConfig {
    /// This node's identity on the gossip network.
    #[serde(default = "default_node_id")]
    pub node_id: String,

    /// Address the peer listener binds, `host:port`.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Statically configured peers, `peer_id -> dial address`.
    #[serde(default)]
    pub peers: BTreeMap<String, String>,

    /// Snapshot directory; `None` disables persistence.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Whether the mining task runs.
    #[serde(default = "default_true")]
    pub enable_mining: bool,

    /// Seconds between mining attempts when the mempool is non-empty.
    #[serde(default = "default_mine_interval")]
    pub mine_interval_secs: u64,

    /// Whether to serve the HTTP query surface.
    #[serde(default)]
    pub enable_rpc: bool,

    /// RPC bind address (if enabled).
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,

    /// Bound on queued inbound transactions (the dispatch channel depth).
    #[serde(default = "default_max_pending_transactions")]
    pub max_pending_transactions: usize,

    /// Bound on the outbound retry table.
    #[serde(default = "default_max_pending_messages")]
    pub max_pending_messages: usize,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Consensus-critical parameters, identical across the cluster.
    #[serde(default)]
    pub params: ChainParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_node_id() -> String {
    "node-1".to_string()
}

fn default_listen_addr() -> String {
    "127.0.0.1:7201".to_string()
}

fn default_true() -> bool {
    true
}

fn default_mine_interval() -> u64 {
    2
}

fn default_rpc_addr() -> String {
    "127.0.0.1:7301".to_string()
}

fn default_max_pending_transactions() -> usize {
    5_000
}

fn default_max_pending_messages() -> usize {
    1_000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "human".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &str) -> Result<Self, NodeError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| NodeError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, NodeError> {
        toml::from_str(s).map_err(|e| NodeError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).expect("NodeConfig is always serializable to TOML")
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            listen_addr: default_listen_addr(),
            peers: BTreeMap::new(),
            data_dir: None,
            enable_mining: default_true(),
            mine_interval_secs: default_mine_interval(),
            enable_rpc: false,
            rpc_addr: default_rpc_addr(),
            max_pending_transactions: default_max_pending_transactions(),
            max_pending_messages: default_max_pending_messages(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            params: ChainParams::default(),
        }
    }
}
