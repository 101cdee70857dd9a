//! Genesis construction.

use crate::block::Block;
use crate::merkle::merkle_root;
use crate::state::State;
use ember_types::{ChainParams, Timestamp};

/// Parent link carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Fixed proof for the genesis block; nothing verifies it, but every node
/// must agree on it for genesis hashes to match.
pub const GENESIS_PROOF: u64 = 1;

/// Build the genesis block and its committed state from chain parameters.
///
/// Deterministic: the timestamp and initial allocation come from the
/// (cluster-identical) params, so every node derives the same genesis hash
/// and state root.
pub fn build_genesis(params: &ChainParams) -> (Block, State) {
    let mut state = State::new();
    for (address, amount) in &params.genesis_accounts {
        state.create_account(address.clone(), *amount);
    }

    let block = Block {
        index: 1,
        timestamp: Timestamp::new(params.genesis_timestamp.clone()),
        transactions: Vec::new(),
        merkle_root: merkle_root(&[]),
        state_root: state.state_root(),
        proof: GENESIS_PROOF,
        previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
    };

    (block, state)
}
