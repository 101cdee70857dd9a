//! Chain parameters.
//!
//! Every field here is consensus-critical and must be identical across all
//! peers in a cluster; nodes exchange a digest of their params at handshake
//! to detect mismatches early.

use crate::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Consensus-critical parameters shared by every node in a cluster.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainParams {
    /// Upper bound on transactions per block.
    pub max_block_txs: usize,

    /// Minimum seconds a block's timestamp must lie after its parent's.
    pub min_block_time_secs: u64,

    /// Maximum seconds a block's timestamp may lie ahead of wall clock.
    pub max_block_future_secs: u64,

    /// Mempool capacity; admission past this point evicts a batch first.
    pub max_mempool_size: usize,

    /// Number of oldest entries evicted when the mempool is full.
    pub mempool_evict_batch: usize,

    /// Consensus monitor loop period.
    pub consensus_tick_ms: u64,

    /// Seconds before an un-acked outbound message is retried.
    pub retry_timeout_secs: u64,

    /// Retry budget per outbound message.
    pub max_retries: u32,

    /// Fixed timestamp of the genesis block. Wall clock would make genesis
    /// hashes differ across nodes.
    pub genesis_timestamp: String,

    /// Initial balances committed by the genesis block's state root.
    pub genesis_accounts: BTreeMap<Address, Amount>,
}

impl ChainParams {
    /// Proof-of-work difficulty (leading zero hex chars) at a given height.
    ///
    /// Constant schedule; a retarget window would hook in here.
    pub fn difficulty_at(&self, height: u64) -> usize {
        4 + (height / 100) as usize
    }
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            max_block_txs: 128,
            min_block_time_secs: 1,
            max_block_future_secs: 7200,
            max_mempool_size: 10_000,
            mempool_evict_batch: 1_000,
            consensus_tick_ms: 5_000,
            retry_timeout_secs: 5,
            max_retries: 3,
            genesis_timestamp: "2024-01-01 00:00:00".to_string(),
            genesis_accounts: BTreeMap::new(),
        }
    }
}
