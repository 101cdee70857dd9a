//! Puzzle-based proof-of-work.
//!
//! A proof is the smallest nonce `p` such that the SHA-256 hex digest of
//! `to_digest(p, prev_proof, index, digest_input)` starts with `difficulty`
//! zero characters. The digest input is the block's Merkle root, so the
//! puzzle binds the proof to the transaction set; the miner and the
//! validator use exactly the same construction.

pub mod generator;
pub mod validator;

pub use generator::find_proof;
pub use validator::validate_proof;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkError {
    #[error("proof search exhausted the nonce space")]
    NonceSpaceExhausted,
}

/// The puzzle digest: `((p² − pp²) + index).to_string() + digest_input`.
///
/// Arithmetic is carried out in i128 so large nonces cannot overflow.
pub(crate) fn to_digest(proof: u64, prev_proof: u64, index: u64, digest_input: &str) -> String {
    let p = proof as i128;
    let pp = prev_proof as i128;
    let calculation = p * p - pp * pp + index as i128;
    format!("{calculation}{digest_input}")
}

/// Whether a hex digest satisfies the leading-zeros target.
pub(crate) fn meets_target(hash_hex: &str, difficulty: usize) -> bool {
    hash_hex.len() >= difficulty && hash_hex.as_bytes()[..difficulty].iter().all(|&b| b == b'0')
}
