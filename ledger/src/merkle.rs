//! Merkle root over a block's transactions.

use crate::transaction::Transaction;
use ember_crypto::{sha256, sha256_hex};
use ember_types::Digest;

/// Binary Merkle tree over `H(canonical(tx))` leaves.
///
/// Levels with odd arity duplicate the last node; nodes combine by hashing
/// the concatenation of the two child digests' hex forms. An empty
/// transaction list commits to `H("")`.
pub fn merkle_root(transactions: &[Transaction]) -> Digest {
    if transactions.is_empty() {
        return sha256(b"");
    }

    let mut level: Vec<String> = transactions
        .iter()
        .map(|tx| sha256_hex(&tx.canonical()))
        .collect();

    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        for pair in level.chunks(2) {
            let right = pair.get(1).unwrap_or(&pair[0]);
            next.push(sha256_hex(format!("{}{}", pair[0], right).as_bytes()));
        }
        level = next;
    }

    Digest::from_hex(&level[0]).expect("sha256_hex always yields 64 hex chars")
}
