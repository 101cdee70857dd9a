//! The chain store: one node's block sequence and committed state.
//!
//! Single owner; the node wraps it in a lock. Every mutation is atomic —
//! either the chain and state both advance, or neither does.

use crate::block::Block;
use crate::error::LedgerError;
use crate::genesis::build_genesis;
use crate::merkle::merkle_root;
use crate::state::State;
use ember_types::{ChainParams, Digest};

/// Owns the ordered block list and the account state it commits to.
#[derive(Clone, Debug)]
pub struct ChainStore {
    params: ChainParams,
    blocks: Vec<Block>,
    state: State,
}

impl ChainStore {
    /// Create a fresh chain holding only the genesis block.
    pub fn new(params: ChainParams) -> Self {
        let (genesis, state) = build_genesis(&params);
        Self {
            params,
            blocks: vec![genesis],
            state,
        }
    }

    /// Rebuild a chain from persisted blocks, revalidating everything.
    ///
    /// The first block must equal the genesis derived from `params`; the
    /// rest replays through full block validation. Replay is authoritative —
    /// a snapshot that does not validate is rejected, not repaired.
    pub fn from_blocks(
        params: ChainParams,
        blocks: Vec<Block>,
        now_secs: u64,
    ) -> Result<Self, LedgerError> {
        let mut iter = blocks.into_iter();
        let first = iter
            .next()
            .ok_or_else(|| LedgerError::BadBlock("snapshot has no genesis block".into()))?;

        let mut chain = Self::new(params);
        if first.compute_hash() != chain.tip().compute_hash() {
            return Err(LedgerError::BadBlock(
                "snapshot genesis does not match chain parameters".into(),
            ));
        }
        for block in iter {
            chain.append(block, now_secs)?;
        }
        Ok(chain)
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Chain height (1 at genesis).
    pub fn height(&self) -> u64 {
        self.blocks.len() as u64
    }

    /// The highest block. The chain always contains at least genesis.
    pub fn tip(&self) -> &Block {
        self.blocks.last().expect("chain always contains genesis")
    }

    /// Hex hash of the tip — the value the longest-chain tie-break compares.
    pub fn tip_hash(&self) -> String {
        self.tip().hash_hex()
    }

    /// Block at a 1-based height.
    pub fn block_at(&self, height: u64) -> Option<&Block> {
        if height == 0 {
            return None;
        }
        self.blocks.get(height as usize - 1)
    }

    /// Hex hash of the block at a 1-based height.
    pub fn hash_at(&self, height: u64) -> Option<String> {
        self.block_at(height).map(Block::hash_hex)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Blocks strictly above `height`, in chain order.
    pub fn suffix_from(&self, height: u64) -> Vec<Block> {
        self.blocks
            .iter()
            .filter(|b| b.index > height)
            .cloned()
            .collect()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Mutable access to committed state — the faucet/dev seeding path only.
    pub fn state_mut(&mut self) -> &mut State {
        &mut self.state
    }

    pub fn state_root(&self) -> Digest {
        self.state.state_root()
    }

    /// Replace committed state wholesale (consensus-monitor snapshot repair).
    pub fn replace_state(&mut self, state: State) {
        self.state = state;
    }

    /// Validate `block` against the current tip and append it.
    ///
    /// Atomic: the block list and the state either both advance or neither
    /// does.
    pub fn append(&mut self, block: Block, now_secs: u64) -> Result<(), LedgerError> {
        let post_state = self.validate_against_tip(&block, now_secs)?;
        tracing::debug!(
            height = block.index,
            txs = block.transactions.len(),
            hash = %block.hash_hex(),
            "appending block"
        );
        self.blocks.push(block);
        self.state = post_state;
        Ok(())
    }

    /// Atomically truncate to `from_height` and append `suffix`.
    ///
    /// State is replayed from genesis up to the truncation point, then the
    /// suffix runs through full block validation. Any failure restores the
    /// prior chain and state untouched.
    pub fn replace_suffix(
        &mut self,
        from_height: u64,
        suffix: Vec<Block>,
        now_secs: u64,
    ) -> Result<(), LedgerError> {
        if from_height == 0 {
            return Err(LedgerError::ChainFork(
                "cannot replace the genesis block".into(),
            ));
        }
        if from_height > self.height() {
            return Err(LedgerError::ChainFork(format!(
                "truncation height {} beyond chain height {}",
                from_height,
                self.height()
            )));
        }

        let saved_blocks = std::mem::take(&mut self.blocks);
        let saved_state = std::mem::replace(&mut self.state, State::new());

        let result = self.rebuild_with_suffix(&saved_blocks, from_height, suffix, now_secs);
        if result.is_err() {
            self.blocks = saved_blocks;
            self.state = saved_state;
        }
        result
    }

    fn rebuild_with_suffix(
        &mut self,
        prior: &[Block],
        from_height: u64,
        suffix: Vec<Block>,
        now_secs: u64,
    ) -> Result<(), LedgerError> {
        let (genesis, genesis_state) = build_genesis(&self.params);
        self.blocks = vec![genesis];
        self.state = genesis_state;

        // Replay the kept prefix. These blocks were validated when first
        // appended; a replay failure means the store was corrupted.
        for block in prior.iter().skip(1).take(from_height as usize - 1) {
            self.state
                .apply_all(&block.transactions)
                .map_err(|e| LedgerError::BadBlock(format!("prefix replay failed: {e}")))?;
            self.blocks.push(block.clone());
        }

        for block in suffix {
            self.append(block, now_secs)?;
        }
        Ok(())
    }

    /// Revalidate the entire chain from genesis.
    pub fn validate_chain(&self, now_secs: u64) -> Result<(), LedgerError> {
        let rebuilt = Self::from_blocks(self.params.clone(), self.blocks.clone(), now_secs)?;
        if rebuilt.state_root() != self.state_root() {
            return Err(LedgerError::BadBlock(
                "committed state does not match chain replay".into(),
            ));
        }
        Ok(())
    }

    /// All §4.6 block checks; returns the post-block state on success.
    fn validate_against_tip(&self, block: &Block, now_secs: u64) -> Result<State, LedgerError> {
        let parent = self.tip();

        if block.index != parent.index + 1 {
            return Err(LedgerError::BadBlock(format!(
                "index {} does not follow tip {}",
                block.index, parent.index
            )));
        }
        if block.previous_hash != parent.hash_hex() {
            return Err(LedgerError::BadBlock("previous hash mismatch".into()));
        }
        if block.transactions.len() > self.params.max_block_txs {
            return Err(LedgerError::BadBlock(format!(
                "{} transactions exceeds limit {}",
                block.transactions.len(),
                self.params.max_block_txs
            )));
        }

        let parent_secs = parent
            .timestamp
            .epoch_secs()
            .map_err(|e| LedgerError::BadBlock(e.to_string()))?;
        let block_secs = block
            .timestamp
            .epoch_secs()
            .map_err(|e| LedgerError::BadBlock(e.to_string()))?;
        if block_secs <= parent_secs {
            return Err(LedgerError::BadBlock(
                "timestamp not after parent".into(),
            ));
        }
        if block_secs < parent_secs + self.params.min_block_time_secs {
            return Err(LedgerError::BadBlock("timestamp too close to parent".into()));
        }
        if block_secs > now_secs + self.params.max_block_future_secs {
            return Err(LedgerError::BadBlock("timestamp too far in the future".into()));
        }

        let expected_merkle = merkle_root(&block.transactions);
        if block.merkle_root != expected_merkle {
            return Err(LedgerError::BadBlock("merkle root mismatch".into()));
        }

        let difficulty = self.params.difficulty_at(block.index);
        if !ember_work::validate_proof(
            block.proof,
            parent.proof,
            block.index,
            &block.merkle_root.to_hex(),
            difficulty,
        ) {
            return Err(LedgerError::BadBlock("proof of work does not verify".into()));
        }

        // Per-transaction signature, nonce succession, and balance rules run
        // against a copy; commit happens in the caller.
        let mut post_state = self.state.clone();
        post_state
            .apply_all(&block.transactions)
            .map_err(|e| LedgerError::BadBlock(format!("transaction apply failed: {e}")))?;

        if block.state_root != post_state.state_root() {
            return Err(LedgerError::BadBlock("state root mismatch".into()));
        }

        Ok(post_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::Transaction;
    use ember_crypto::{derive_address, keypair_from_seed, KeyPair};
    use ember_types::{Address, Amount, Timestamp};

    const NOW: u64 = 1_704_070_000;

    fn funded_params(seed: u8, balance: u64) -> (KeyPair, ChainParams) {
        let kp = keypair_from_seed(&[seed; 32]);
        let mut params = ChainParams::default();
        params
            .genesis_accounts
            .insert(derive_address(&kp.public), Amount::new(balance));
        (kp, params)
    }

    fn transfer(kp: &KeyPair, to: &str, amount: u64, gas: u64, nonce: u64) -> Transaction {
        Transaction::new_signed(
            kp,
            Address::new(to),
            Amount::new(amount),
            Amount::new(gas),
            nonce,
            Timestamp::from_epoch_secs(NOW),
        )
    }

    /// Mine a valid block on top of the chain's tip (test-side twin of the
    /// node's miner).
    fn mine(chain: &ChainStore, txs: Vec<Transaction>, now: u64) -> Block {
        let parent = chain.tip();
        let index = parent.index + 1;
        let root = merkle_root(&txs);
        let proof = ember_work::find_proof(
            parent.proof,
            index,
            &root.to_hex(),
            chain.params().difficulty_at(index),
        )
        .unwrap();
        let mut post = chain.state().clone();
        post.apply_all(&txs).unwrap();
        let parent_secs = parent.timestamp.epoch_secs().unwrap();
        let min_gap = chain.params().min_block_time_secs.max(1);
        Block {
            index,
            timestamp: Timestamp::from_epoch_secs(now.max(parent_secs + min_gap)),
            merkle_root: root,
            state_root: post.state_root(),
            transactions: txs,
            proof,
            previous_hash: parent.hash_hex(),
        }
    }

    #[test]
    fn append_advances_height_and_state() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        let block = mine(&chain, vec![transfer(&kp, "0xb", 100, 1, 0)], NOW);
        chain.append(block, NOW).unwrap();

        assert_eq!(chain.height(), 2);
        assert_eq!(chain.state().balance(&Address::new("0xb")), Amount::new(100));
        assert_eq!(
            chain.state().balance(&derive_address(&kp.public)),
            Amount::new(899)
        );
    }

    #[test]
    fn append_rejects_broken_link() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        let mut block = mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW);
        block.previous_hash = "f".repeat(64);
        let err = chain.append(block, NOW).unwrap_err();
        assert!(matches!(err, LedgerError::BadBlock(_)));
        assert_eq!(chain.height(), 1);
    }

    #[test]
    fn append_rejects_wrong_state_root() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        let mut block = mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW);
        block.state_root = ember_crypto::sha256(b"forged");
        assert!(matches!(
            chain.append(block, NOW).unwrap_err(),
            LedgerError::BadBlock(_)
        ));
    }

    #[test]
    fn append_rejects_bad_proof() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        let mut block = mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW);
        // Find a nonce that fails the target; the proof search returns the
        // smallest valid nonce, so anything below it fails.
        if block.proof > 0 {
            block.proof -= 1;
            // Recompute nothing else: proof is not part of merkle/state.
            assert!(matches!(
                chain.append(block, NOW).unwrap_err(),
                LedgerError::BadBlock(_)
            ));
        }
    }

    #[test]
    fn append_rejects_stale_timestamp() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        let genesis_secs = chain.tip().timestamp.epoch_secs().unwrap();
        let mut block = mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW);
        block.timestamp = Timestamp::from_epoch_secs(genesis_secs);
        // Timestamp is hashed into the state-independent fields only through
        // the block hash, so the proof stays valid; the timestamp rule alone
        // must reject it.
        assert!(matches!(
            chain.append(block, NOW).unwrap_err(),
            LedgerError::BadBlock(_)
        ));
    }

    #[test]
    fn append_rejects_far_future_timestamp() {
        let (kp, params) = funded_params(1, 1000);
        let future = params.max_block_future_secs;
        let mut chain = ChainStore::new(params);
        let block = mine(
            &chain,
            vec![transfer(&kp, "0xb", 10, 0, 0)],
            NOW + future + 10,
        );
        assert!(matches!(
            chain.append(block, NOW).unwrap_err(),
            LedgerError::BadBlock(_)
        ));
    }

    #[test]
    fn empty_block_keeps_state_root() {
        let (_, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        let root_before = chain.state_root();
        let block = mine(&chain, vec![], NOW);
        assert_eq!(block.merkle_root, ember_crypto::sha256(b""));
        chain.append(block, NOW).unwrap();
        assert_eq!(chain.state_root(), root_before);
    }

    #[test]
    fn suffix_from_returns_blocks_above_height() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        chain
            .append(mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW), NOW)
            .unwrap();
        chain
            .append(
                mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 1)], NOW + 10),
                NOW + 10,
            )
            .unwrap();

        assert_eq!(chain.suffix_from(1).len(), 2);
        assert_eq!(chain.suffix_from(2).len(), 1);
        assert!(chain.suffix_from(3).is_empty());
    }

    #[test]
    fn replace_suffix_with_own_suffix_is_noop() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        chain
            .append(mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW), NOW)
            .unwrap();
        let tip_before = chain.tip_hash();
        let root_before = chain.state_root();

        let suffix = chain.suffix_from(1);
        chain.replace_suffix(1, suffix, NOW).unwrap();

        assert_eq!(chain.tip_hash(), tip_before);
        assert_eq!(chain.state_root(), root_before);
    }

    #[test]
    fn replace_suffix_adopts_longer_fork() {
        let (kp, params) = funded_params(1, 1000);

        // Two chains diverge after genesis.
        let mut ours = ChainStore::new(params.clone());
        ours.append(mine(&ours, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW), NOW)
            .unwrap();

        let mut theirs = ChainStore::new(params);
        theirs
            .append(
                mine(&theirs, vec![transfer(&kp, "0xc", 20, 0, 0)], NOW + 5),
                NOW + 5,
            )
            .unwrap();
        theirs
            .append(
                mine(&theirs, vec![transfer(&kp, "0xc", 20, 0, 1)], NOW + 15),
                NOW + 15,
            )
            .unwrap();

        ours.replace_suffix(1, theirs.suffix_from(1), NOW + 20).unwrap();
        assert_eq!(ours.height(), 3);
        assert_eq!(ours.tip_hash(), theirs.tip_hash());
        assert_eq!(ours.state_root(), theirs.state_root());
        assert_eq!(ours.state().balance(&Address::new("0xb")), Amount::ZERO);
    }

    #[test]
    fn replace_suffix_restores_on_failure() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        chain
            .append(mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW), NOW)
            .unwrap();
        let tip_before = chain.tip_hash();
        let root_before = chain.state_root();

        let mut bad = chain.suffix_from(1);
        bad[0].state_root = ember_crypto::sha256(b"forged");
        assert!(chain.replace_suffix(1, bad, NOW).is_err());

        assert_eq!(chain.tip_hash(), tip_before);
        assert_eq!(chain.state_root(), root_before);
    }

    #[test]
    fn replace_suffix_refuses_to_touch_genesis() {
        let (_, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        assert!(matches!(
            chain.replace_suffix(0, vec![], NOW).unwrap_err(),
            LedgerError::ChainFork(_)
        ));
    }

    #[test]
    fn from_blocks_replays_and_validates() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params.clone());
        chain
            .append(mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW), NOW)
            .unwrap();

        let reloaded =
            ChainStore::from_blocks(params.clone(), chain.blocks().to_vec(), NOW).unwrap();
        assert_eq!(reloaded.tip_hash(), chain.tip_hash());
        assert_eq!(reloaded.state_root(), chain.state_root());

        // A tampered snapshot is rejected.
        let mut tampered = chain.blocks().to_vec();
        tampered[1].proof ^= 1;
        assert!(ChainStore::from_blocks(params, tampered, NOW).is_err());
    }

    #[test]
    fn validate_chain_detects_out_of_band_state_edit() {
        let (kp, params) = funded_params(1, 1000);
        let mut chain = ChainStore::new(params);
        chain
            .append(mine(&chain, vec![transfer(&kp, "0xb", 10, 0, 0)], NOW), NOW)
            .unwrap();
        chain.validate_chain(NOW).unwrap();

        chain
            .state_mut()
            .create_account(Address::new("0xevil"), Amount::new(1));
        assert!(chain.validate_chain(NOW).is_err());
    }
}
