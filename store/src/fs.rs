//! JSON-file snapshot backend.
//!
//! Layout: `<data_dir>/blocks.json` and `<data_dir>/state.json`. Writes go
//! through a temp file + rename so a crash mid-write never leaves a torn
//! snapshot.

use crate::{Snapshotter, StoreError};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

const BLOCKS_FILE: &str = "blocks.json";
const STATE_FILE: &str = "state.json";

/// File-based snapshotter rooted at a data directory.
pub struct FsStore {
    data_dir: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) the data directory.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        Ok(Self { data_dir })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Delete every saved snapshot.
    pub fn clear_all_data(&self) -> Result<(), StoreError> {
        for file in [BLOCKS_FILE, STATE_FILE] {
            let path = self.data_dir.join(file);
            if path.exists() {
                fs::remove_file(path)?;
            }
        }
        Ok(())
    }

    /// Number of blocks in the saved snapshot, 0 if none.
    pub fn block_count(&self) -> u64 {
        match self.load_blocks() {
            Ok(Some(Value::Array(blocks))) => blocks.len() as u64,
            _ => 0,
        }
    }

    /// Total bytes across saved snapshot files.
    pub fn total_storage_size(&self) -> u64 {
        [BLOCKS_FILE, STATE_FILE]
            .iter()
            .filter_map(|f| fs::metadata(self.data_dir.join(f)).ok())
            .map(|m| m.len())
            .sum()
    }

    fn write_atomic(&self, file: &str, value: &Value) -> Result<(), StoreError> {
        let tmp = self.data_dir.join(format!("{file}.tmp"));
        let path = self.data_dir.join(file);
        fs::write(&tmp, serde_json::to_vec_pretty(value).expect("Value serializes"))?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn read_optional(&self, file: &str) -> Result<Option<Value>, StoreError> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(path)?;
        let value =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(value))
    }
}

impl Snapshotter for FsStore {
    fn save_blocks(&self, blocks: &Value) -> Result<(), StoreError> {
        self.write_atomic(BLOCKS_FILE, blocks)
    }

    fn save_state(&self, state: &Value) -> Result<(), StoreError> {
        self.write_atomic(STATE_FILE, state)
    }

    fn load_blocks(&self) -> Result<Option<Value>, StoreError> {
        self.read_optional(BLOCKS_FILE)
    }

    fn load_state(&self) -> Result<Option<Value>, StoreError> {
        self.read_optional(STATE_FILE)
    }

    fn has_saved_data(&self) -> bool {
        self.data_dir.join(BLOCKS_FILE).exists() || self.data_dir.join(STATE_FILE).exists()
    }
}
