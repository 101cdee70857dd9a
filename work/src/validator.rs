//! Proof validation.

use crate::{meets_target, to_digest};
use ember_crypto::sha256_hex;

/// Validate a proof against the same puzzle the generator solved.
pub fn validate_proof(
    proof: u64,
    prev_proof: u64,
    index: u64,
    digest_input: &str,
    difficulty: usize,
) -> bool {
    let digest = sha256_hex(to_digest(proof, prev_proof, index, digest_input).as_bytes());
    meets_target(&digest, difficulty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::find_proof;

    #[test]
    fn rejects_wrong_digest_input() {
        let proof = find_proof(1, 2, "payload", 2).unwrap();
        assert!(validate_proof(proof, 1, 2, "payload", 2));
        assert!(!validate_proof(proof, 1, 2, "different payload", 2));
    }

    #[test]
    fn rejects_wrong_parent_proof() {
        let proof = find_proof(5, 4, "txs", 2).unwrap();
        assert!(validate_proof(proof, 5, 4, "txs", 2));
        assert!(!validate_proof(proof, 6, 4, "txs", 2));
    }

    #[test]
    fn difficulty_is_monotonic() {
        let proof = find_proof(1, 1, "x", 3).unwrap();
        assert!(validate_proof(proof, 1, 1, "x", 3));
        assert!(validate_proof(proof, 1, 1, "x", 2));
        assert!(validate_proof(proof, 1, 1, "x", 0));
    }

    #[test]
    fn large_nonces_do_not_overflow() {
        // p² for a nonce near u64::MAX exceeds u64; the i128 digest
        // arithmetic must keep the puzzle well-defined at the extremes.
        assert!(validate_proof(u64::MAX, u64::MAX, u64::MAX, "", 0));
        assert!(validate_proof(u64::MAX, 0, 0, "suffix", 0));
    }
}
