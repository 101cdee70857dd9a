//! Block construction: select transactions, solve the puzzle, seal.

use ember_ledger::{merkle_root, Block, ChainStore, Transaction};
use ember_types::Timestamp;

use crate::error::NodeError;

/// Build and seal a block on top of `chain`'s tip.
///
/// The proof search blocks the calling thread until the puzzle is solved;
/// callers run this under `spawn_blocking`. The chain itself is not mutated —
/// the caller appends the returned block, which re-runs full validation
/// against whatever the tip is by then.
pub fn build_block(
    chain: &ChainStore,
    transactions: Vec<Transaction>,
    now_secs: u64,
) -> Result<Block, NodeError> {
    let parent = chain.tip();
    let index = parent.index + 1;

    // Apply before searching: an unsatisfiable batch should fail here, not
    // after the proof loop has burned its cycles.
    let mut post_state = chain.state().clone();
    post_state
        .apply_all(&transactions)
        .map_err(NodeError::Ledger)?;

    let root = merkle_root(&transactions);
    let difficulty = chain.params().difficulty_at(index);
    let proof = ember_work::find_proof(parent.proof, index, &root.to_hex(), difficulty)?;

    // Strictly after the parent and at least the configured gap; wall clock
    // when it is already far enough ahead.
    let parent_secs = parent
        .timestamp
        .epoch_secs()
        .map_err(|e| NodeError::Other(e.to_string()))?;
    let min_gap = chain.params().min_block_time_secs.max(1);
    let block_secs = now_secs.max(parent_secs + min_gap);

    Ok(Block {
        index,
        timestamp: Timestamp::from_epoch_secs(block_secs),
        merkle_root: root,
        state_root: post_state.state_root(),
        transactions,
        proof,
        previous_hash: parent.hash_hex(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_crypto::{derive_address, keypair_from_seed};
    use ember_types::{Address, Amount, ChainParams};

    const NOW: u64 = 1_704_070_000;

    #[test]
    fn mined_block_appends_cleanly() {
        let kp = keypair_from_seed(&[5u8; 32]);
        let mut params = ChainParams::default();
        params
            .genesis_accounts
            .insert(derive_address(&kp.public), Amount::new(500));
        let mut chain = ChainStore::new(params);

        let tx = Transaction::new_signed(
            &kp,
            Address::new("0xb"),
            Amount::new(100),
            Amount::new(1),
            0,
            Timestamp::from_epoch_secs(NOW),
        );
        let block = build_block(&chain, vec![tx], NOW).unwrap();
        chain.append(block, NOW).unwrap();
        assert_eq!(chain.height(), 2);
        assert_eq!(chain.state().balance(&Address::new("0xb")), Amount::new(100));
    }

    #[test]
    fn empty_block_mines_and_appends() {
        let mut chain = ChainStore::new(ChainParams::default());
        let block = build_block(&chain, vec![], NOW).unwrap();
        assert!(block.transactions.is_empty());
        chain.append(block, NOW).unwrap();
        assert_eq!(chain.height(), 2);
    }

    #[test]
    fn timestamp_clears_parent_even_when_clock_lags() {
        let chain = ChainStore::new(ChainParams::default());
        let genesis_secs = chain.tip().timestamp.epoch_secs().unwrap();
        // Clock says the genesis instant; the block must still land after it.
        let block = build_block(&chain, vec![], genesis_secs).unwrap();
        assert!(block.timestamp.epoch_secs().unwrap() > genesis_secs);
    }

    #[test]
    fn invalid_batch_refuses_to_seal() {
        let kp = keypair_from_seed(&[5u8; 32]);
        let chain = ChainStore::new(ChainParams::default()); // sender unfunded
        let tx = Transaction::new_signed(
            &kp,
            Address::new("0xb"),
            Amount::new(100),
            Amount::ZERO,
            0,
            Timestamp::from_epoch_secs(NOW),
        );
        assert!(build_block(&chain, vec![tx], NOW).is_err());
    }
}
