//! Persistence of the highest fully exported block.
//!
//! Every backend stores a single integer under a backend specific key and
//! must survive a process restart. Backends only implement raw
//! [CheckpointStore::load] and [CheckpointStore::store]; the sync facing
//! operations are provided on top of them.
use std::sync::Arc;

use async_trait::async_trait;

mod config;
mod error;
mod file;
mod memory;
mod rocks;
mod sql;

pub use config::{CheckpointConfig, DEFAULT_CHECKPOINT_FILE, DEFAULT_ROCKSDB_KEY};
pub use error::CheckpointError;
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
pub use rocks::RocksDbCheckpointStore;
pub use sql::SqlCheckpointStore;

pub type Result<T, E = CheckpointError> = std::result::Result<T, E>;

#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// The stored value, or [None] if nothing was ever written.
    async fn load(&self) -> Result<Option<u64>>;

    /// Durably overwrites the stored value.
    async fn store(&self, block_n: u64) -> Result<()>;

    /// Human readable location, for logs.
    fn location(&self) -> String;

    /// The last synced block, 0 if never set.
    async fn get(&self) -> Result<u64> {
        Ok(self.load().await?.unwrap_or(0))
    }

    async fn exists(&self) -> Result<bool> {
        Ok(self.load().await?.is_some())
    }

    async fn set(&self, block_n: u64) -> Result<()> {
        self.store(block_n).await?;
        tracing::debug!(block_n, location = self.location(), "Checkpoint written");
        Ok(())
    }

    /// One-time administrative override of the start point.
    ///
    /// Fails with [CheckpointError::AlreadyInitialized] if a checkpoint is
    /// already present, so an existing sync position is never silently moved.
    async fn initialize(&self, block_n: u64) -> Result<()> {
        if let Some(current) = self.load().await? {
            return Err(CheckpointError::AlreadyInitialized { current, requested: block_n });
        }
        tracing::info!(block_n, location = self.location(), "Initializing checkpoint");
        self.store(block_n).await
    }
}

/// Opens the backend described by `config`.
pub async fn open(config: &CheckpointConfig) -> Result<Arc<dyn CheckpointStore>> {
    let store: Arc<dyn CheckpointStore> = match config {
        CheckpointConfig::File { path } => Arc::new(FileCheckpointStore::new(path.clone())),
        CheckpointConfig::Sql { url, sync_id } => Arc::new(SqlCheckpointStore::connect(url, sync_id.clone()).await?),
        CheckpointConfig::Rocksdb { path, key } => Arc::new(RocksDbCheckpointStore::open(path, key.clone())?),
    };
    tracing::info!(location = store.location(), "Using checkpoint store");
    Ok(store)
}
