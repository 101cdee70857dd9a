//! Nullable snapshotter — in-memory persistence for testing.

use ember_store::{Snapshotter, StoreError};
use serde_json::Value;
use std::sync::Mutex;

/// In-memory [`Snapshotter`]: saves land in a mutex-guarded cell, loads hand
/// them back. Nothing touches disk.
#[derive(Default)]
pub struct NullStore {
    blocks: Mutex<Option<Value>>,
    state: Mutex<Option<Value>>,
}

impl NullStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Snapshotter for NullStore {
    fn save_blocks(&self, blocks: &Value) -> Result<(), StoreError> {
        *self.blocks.lock().expect("store lock poisoned") = Some(blocks.clone());
        Ok(())
    }

    fn save_state(&self, state: &Value) -> Result<(), StoreError> {
        *self.state.lock().expect("store lock poisoned") = Some(state.clone());
        Ok(())
    }

    fn load_blocks(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.blocks.lock().expect("store lock poisoned").clone())
    }

    fn load_state(&self) -> Result<Option<Value>, StoreError> {
        Ok(self.state.lock().expect("store lock poisoned").clone())
    }

    fn has_saved_data(&self) -> bool {
        self.blocks.lock().expect("store lock poisoned").is_some()
            || self.state.lock().expect("store lock poisoned").is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn roundtrip_in_memory() {
        let store = NullStore::new();
        assert!(!store.has_saved_data());
        store.save_blocks(&json!([{"index": 1}])).unwrap();
        assert!(store.has_saved_data());
        assert_eq!(store.load_blocks().unwrap(), Some(json!([{"index": 1}])));
        assert_eq!(store.load_state().unwrap(), None);
    }
}
