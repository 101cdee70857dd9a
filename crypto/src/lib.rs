//! Cryptographic primitives for the ember chain.
//!
//! The rest of the workspace depends on these functions, never on the
//! underlying crates directly, so the hash or signature scheme can be
//! swapped behind this boundary.

pub mod hash;
pub mod keys;
pub mod sign;

pub use hash::{params_digest, sha256, sha256_hex};
pub use keys::{derive_address, generate_keypair, keypair_from_seed, KeyPair, PublicKey, SecretKey};
pub use sign::{sign_message, verify_signature, Signature};
