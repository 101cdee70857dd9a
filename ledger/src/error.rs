//! Ledger error kinds.
//!
//! These are semantic classifications: the dispatcher and the RPC surface
//! branch on the variant, not on message text.

use ember_types::Amount;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("invalid signature or transaction id")]
    InvalidSignature,

    #[error("bad nonce: expected {expected}, got {got}")]
    BadNonce { expected: u64, got: u64 },

    #[error("insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Amount, available: Amount },

    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    #[error("bad block: {0}")]
    BadBlock(String),

    #[error("chain fork: {0}")]
    ChainFork(String),
}
