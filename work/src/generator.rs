//! Proof generation (CPU).

use crate::{meets_target, to_digest, WorkError};
use ember_crypto::sha256_hex;

/// Find the smallest nonce satisfying the puzzle predicate.
///
/// Blocks the calling thread in a tight loop; callers run it on a dedicated
/// mining thread (`spawn_blocking` in the node).
pub fn find_proof(
    prev_proof: u64,
    index: u64,
    digest_input: &str,
    difficulty: usize,
) -> Result<u64, WorkError> {
    let mut nonce: u64 = 0;
    loop {
        let digest = sha256_hex(to_digest(nonce, prev_proof, index, digest_input).as_bytes());
        if meets_target(&digest, difficulty) {
            return Ok(nonce);
        }
        nonce = nonce.checked_add(1).ok_or(WorkError::NonceSpaceExhausted)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate_proof;

    #[test]
    fn generated_proof_passes_validation() {
        let proof = find_proof(1, 2, "abc123", 2).unwrap();
        assert!(validate_proof(proof, 1, 2, "abc123", 2));
    }

    #[test]
    fn proof_is_smallest_satisfying_nonce() {
        let proof = find_proof(7, 3, "deadbeef", 2).unwrap();
        for smaller in 0..proof {
            assert!(!validate_proof(smaller, 7, 3, "deadbeef", 2));
        }
    }

    #[test]
    fn zero_difficulty_accepts_first_nonce() {
        assert_eq!(find_proof(0, 1, "", 0).unwrap(), 0);
    }
}
