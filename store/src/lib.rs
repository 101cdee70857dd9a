//! The snapshot persistence boundary.
//!
//! The chain core treats persistence as an opaque snapshotter: it hands over
//! JSON values and gets them back. Backends implement [`Snapshotter`]; the
//! rest of the workspace depends only on the trait. Replay is authoritative —
//! a loaded snapshot is revalidated by the chain store, never trusted.

pub mod fs;

pub use fs::FsStore;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot is not valid JSON: {0}")]
    Corrupt(String),
}

/// Opaque key-value snapshotter for chain and state data.
pub trait Snapshotter: Send + Sync {
    /// Persist the full block sequence.
    fn save_blocks(&self, blocks: &Value) -> Result<(), StoreError>;

    /// Persist the account-state snapshot (balances, nonces, difficulty).
    fn save_state(&self, state: &Value) -> Result<(), StoreError>;

    /// Load the persisted block sequence, `None` if nothing was saved.
    fn load_blocks(&self) -> Result<Option<Value>, StoreError>;

    /// Load the persisted state snapshot, `None` if nothing was saved.
    fn load_state(&self) -> Result<Option<Value>, StoreError>;

    /// Whether any snapshot exists.
    fn has_saved_data(&self) -> bool;
}
