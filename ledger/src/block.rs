//! Blocks.

use crate::transaction::Transaction;
use ember_types::{Digest, Timestamp};
use serde::{Deserialize, Serialize};

/// An immutable chain entry.
///
/// The block's own hash is not stored; [`Block::compute_hash`] derives it
/// from the canonical encoding of all fields below. Field order is
/// canonical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// 1-based height; genesis is 1.
    pub index: u64,
    pub timestamp: Timestamp,
    pub transactions: Vec<Transaction>,
    /// Merkle root over the canonical encodings of `transactions`.
    pub merkle_root: Digest,
    /// Commitment to the account table *after* this block's transactions.
    pub state_root: Digest,
    /// Proof-of-work nonce.
    pub proof: u64,
    /// Hex hash of the parent block; `"0"` for genesis.
    pub previous_hash: String,
}

impl Block {
    /// Hash of the canonical encoding of the full block.
    pub fn compute_hash(&self) -> Digest {
        let encoded = serde_json::to_vec(self).expect("block serialization is infallible");
        ember_crypto::sha256(&encoded)
    }

    /// Hex form of [`Block::compute_hash`] — the form `previous_hash` links
    /// carry and the tip tie-break compares.
    pub fn hash_hex(&self) -> String {
        self.compute_hash().to_hex()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::merkle_root;
    use ember_crypto::keypair_from_seed;
    use ember_types::{Address, Amount};

    fn sample_block() -> Block {
        let kp = keypair_from_seed(&[9u8; 32]);
        let tx = Transaction::new_signed(
            &kp,
            Address::new("0xb"),
            Amount::new(10),
            Amount::ZERO,
            0,
            Timestamp::from_epoch_secs(1_704_067_260),
        );
        let txs = vec![tx];
        Block {
            index: 2,
            timestamp: Timestamp::from_epoch_secs(1_704_067_300),
            merkle_root: merkle_root(&txs),
            transactions: txs,
            state_root: Digest::ZERO,
            proof: 42,
            previous_hash: "0".repeat(64),
        }
    }

    #[test]
    fn hash_is_deterministic() {
        let block = sample_block();
        assert_eq!(block.compute_hash(), block.compute_hash());
    }

    #[test]
    fn hash_covers_every_field() {
        let block = sample_block();
        let base = block.compute_hash();

        let mut changed = block.clone();
        changed.proof += 1;
        assert_ne!(changed.compute_hash(), base);

        let mut changed = block.clone();
        changed.state_root = ember_crypto::sha256(b"other");
        assert_ne!(changed.compute_hash(), base);

        let mut changed = block.clone();
        changed.previous_hash = "1".repeat(64);
        assert_ne!(changed.compute_hash(), base);
    }

    #[test]
    fn wire_roundtrip_preserves_hash() {
        let block = sample_block();
        let encoded = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, block);
        assert_eq!(decoded.compute_hash(), block.compute_hash());
    }
}
