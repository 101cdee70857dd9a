//! The mempool: a bounded FIFO buffer of validated transactions awaiting
//! inclusion.
//!
//! Admission runs the state-apply rules against the *committed* state, so at
//! most one pending transaction per sender is admissible at a time (the
//! second would need a nonce the committed table has not reached yet).

use std::collections::{HashSet, VecDeque};

use ember_ledger::{LedgerError, State, Transaction};
use ember_types::Digest;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MempoolError {
    #[error(transparent)]
    Rejected(#[from] LedgerError),

    #[error("transaction already pending")]
    Duplicate,
}

/// Bounded first-in-first-out admission buffer.
pub struct Mempool {
    queue: VecDeque<Transaction>,
    /// Ids currently queued, for O(1) duplicate rejection.
    pending_ids: HashSet<Digest>,
    max_size: usize,
    evict_batch: usize,
}

impl Mempool {
    pub fn new(max_size: usize, evict_batch: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            pending_ids: HashSet::new(),
            max_size,
            evict_batch,
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, id: &Digest) -> bool {
        self.pending_ids.contains(id)
    }

    /// Admit a transaction after validating it against committed state.
    ///
    /// At capacity, the oldest `evict_batch` entries are dropped before the
    /// new entry is queued; eviction is logged but never an error.
    pub fn admit(&mut self, tx: Transaction, committed: &State) -> Result<(), MempoolError> {
        if self.pending_ids.contains(&tx.id) {
            return Err(MempoolError::Duplicate);
        }
        committed.validate_transaction(&tx)?;

        if self.queue.len() >= self.max_size {
            let evicted = self.evict_oldest(self.evict_batch);
            tracing::warn!(evicted, remaining = self.queue.len(), "mempool full, evicted oldest batch");
        }

        self.pending_ids.insert(tx.id);
        self.queue.push_back(tx);
        Ok(())
    }

    /// Drop up to `count` oldest entries; returns how many went.
    fn evict_oldest(&mut self, count: usize) -> usize {
        let mut evicted = 0;
        while evicted < count {
            match self.queue.pop_front() {
                Some(tx) => {
                    self.pending_ids.remove(&tx.id);
                    evicted += 1;
                }
                None => break,
            }
        }
        evicted
    }

    /// Drain up to `max` oldest entries that are still valid against
    /// `committed`, for inclusion in a block.
    ///
    /// Entries invalidated since admission (say, their sender's nonce was
    /// consumed by a foreign block) are dropped here rather than tracked
    /// eagerly on every state change.
    pub fn drain_valid(&mut self, max: usize, committed: &State) -> Vec<Transaction> {
        // The batch must be valid *as a sequence*: later transactions can
        // depend on balances credited by earlier ones.
        let mut projected = committed.clone();
        let mut batch = Vec::new();
        while batch.len() < max {
            let Some(tx) = self.queue.pop_front() else {
                break;
            };
            self.pending_ids.remove(&tx.id);
            match projected.apply_transaction(&tx) {
                Ok(()) => batch.push(tx),
                Err(e) => {
                    tracing::debug!(id = %tx.id, error = %e, "dropping stale mempool entry");
                }
            }
        }
        batch
    }

    /// Remove entries included in a mined or received block.
    pub fn remove_included(&mut self, included: &[Transaction]) {
        let ids: HashSet<Digest> = included.iter().map(|tx| tx.id).collect();
        self.queue.retain(|tx| !ids.contains(&tx.id));
        for id in ids {
            self.pending_ids.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_crypto::{derive_address, keypair_from_seed, KeyPair};
    use ember_types::{Address, Amount, Timestamp};

    fn funded_state(seeds: std::ops::Range<u16>, balance: u64) -> (Vec<KeyPair>, State) {
        let mut state = State::new();
        let mut keys = Vec::new();
        for seed in seeds {
            let mut bytes = [0u8; 32];
            bytes[..2].copy_from_slice(&seed.to_le_bytes());
            let kp = keypair_from_seed(&bytes);
            state.create_account(derive_address(&kp.public), Amount::new(balance));
            keys.push(kp);
        }
        (keys, state)
    }

    fn transfer(kp: &KeyPair, amount: u64, nonce: u64) -> Transaction {
        Transaction::new_signed(
            kp,
            Address::new("0xdest"),
            Amount::new(amount),
            Amount::new(1),
            nonce,
            Timestamp::from_epoch_secs(1_704_067_200),
        )
    }

    #[test]
    fn admits_valid_transaction() {
        let (keys, state) = funded_state(0..1, 1000);
        let mut pool = Mempool::new(10, 2);
        pool.admit(transfer(&keys[0], 10, 0), &state).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn rejects_duplicate_id() {
        let (keys, state) = funded_state(0..1, 1000);
        let mut pool = Mempool::new(10, 2);
        let tx = transfer(&keys[0], 10, 0);
        pool.admit(tx.clone(), &state).unwrap();
        assert_eq!(pool.admit(tx, &state).unwrap_err(), MempoolError::Duplicate);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn one_pending_transaction_per_sender() {
        let (keys, state) = funded_state(0..1, 1000);
        let mut pool = Mempool::new(10, 2);
        pool.admit(transfer(&keys[0], 10, 0), &state).unwrap();
        // Nonce 1 is not yet reachable from committed state.
        let err = pool.admit(transfer(&keys[0], 10, 1), &state).unwrap_err();
        assert_eq!(
            err,
            MempoolError::Rejected(LedgerError::BadNonce { expected: 0, got: 1 })
        );
    }

    #[test]
    fn rejects_insufficient_balance() {
        let (keys, state) = funded_state(0..1, 50);
        let mut pool = Mempool::new(10, 2);
        let err = pool.admit(transfer(&keys[0], 100, 0), &state).unwrap_err();
        assert!(matches!(
            err,
            MempoolError::Rejected(LedgerError::InsufficientBalance { .. })
        ));
        assert!(pool.is_empty());
    }

    #[test]
    fn overflow_evicts_oldest_batch() {
        let max = 8;
        let batch = 3;
        let (keys, state) = funded_state(0..(max as u16 + 1), 1000);
        let mut pool = Mempool::new(max, batch);

        let txs: Vec<Transaction> = keys.iter().map(|kp| transfer(kp, 10, 0)).collect();
        for tx in &txs[..max] {
            pool.admit(tx.clone(), &state).unwrap();
        }
        assert_eq!(pool.len(), max);

        // One more admission: exactly `batch` oldest entries go first.
        pool.admit(txs[max].clone(), &state).unwrap();
        assert_eq!(pool.len(), max - batch + 1);
        for evicted in &txs[..batch] {
            assert!(!pool.contains(&evicted.id));
        }
        assert!(pool.contains(&txs[max].id));
    }

    #[test]
    fn drain_respects_fifo_and_limit() {
        let (keys, state) = funded_state(0..5, 1000);
        let mut pool = Mempool::new(10, 2);
        let txs: Vec<Transaction> = keys.iter().map(|kp| transfer(kp, 10, 0)).collect();
        for tx in &txs {
            pool.admit(tx.clone(), &state).unwrap();
        }

        let drained = pool.drain_valid(3, &state);
        assert_eq!(drained.len(), 3);
        assert_eq!(drained[0].id, txs[0].id);
        assert_eq!(drained[2].id, txs[2].id);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn drain_skips_entries_invalidated_by_state_changes() {
        let (keys, mut state) = funded_state(0..2, 1000);
        let mut pool = Mempool::new(10, 2);
        let stale = transfer(&keys[0], 10, 0);
        let fresh = transfer(&keys[1], 10, 0);
        pool.admit(stale.clone(), &state).unwrap();
        pool.admit(fresh.clone(), &state).unwrap();

        // A foreign block consumes sender 0's nonce before we mine.
        state.apply_transaction(&stale).unwrap();

        let drained = pool.drain_valid(10, &state);
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, fresh.id);
        assert!(pool.is_empty());
    }

    #[test]
    fn remove_included_clears_mined_entries() {
        let (keys, state) = funded_state(0..2, 1000);
        let mut pool = Mempool::new(10, 2);
        let a = transfer(&keys[0], 10, 0);
        let b = transfer(&keys[1], 10, 0);
        pool.admit(a.clone(), &state).unwrap();
        pool.admit(b.clone(), &state).unwrap();

        pool.remove_included(std::slice::from_ref(&a));
        assert_eq!(pool.len(), 1);
        assert!(!pool.contains(&a.id));
        assert!(pool.contains(&b.id));
    }
}
