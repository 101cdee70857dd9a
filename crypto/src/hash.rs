//! SHA-256 hashing for transactions, blocks, and state roots.

use ember_types::{ChainParams, Digest};
use sha2::{Digest as _, Sha256};

/// Compute the SHA-256 digest of arbitrary data.
pub fn sha256(data: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    Digest::new(output)
}

/// SHA-256 digest rendered as lowercase hex — the form used throughout the
/// canonical encoding.
pub fn sha256_hex(data: &[u8]) -> String {
    sha256(data).to_hex()
}

/// Digest of a node's chain parameters, exchanged at handshake so peers with
/// divergent configuration are rejected before they pollute each other.
pub fn params_digest(params: &ChainParams) -> Digest {
    let encoded =
        serde_json::to_vec(params).expect("ChainParams serialization is infallible");
    sha256(&encoded)
}
