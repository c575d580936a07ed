use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CHECKPOINT_FILE: &str = "last_synced_block.txt";
pub const DEFAULT_ROCKSDB_KEY: &str = "last_synced_block";

/// Checkpoint backend selection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum CheckpointConfig {
    /// Plain text file holding the block number.
    File { path: PathBuf },
    /// Row of the `sync_checkpoints` table keyed by `sync_id`. PostgreSQL and
    /// SQLite urls are supported.
    Sql { url: String, sync_id: String },
    /// Big-endian `u64` under `key`.
    Rocksdb { path: PathBuf, key: String },
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self::File { path: PathBuf::from(DEFAULT_CHECKPOINT_FILE) }
    }
}
