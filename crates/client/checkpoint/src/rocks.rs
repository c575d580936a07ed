use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rocksdb::{Options, WriteOptions, DB};
use tokio::task;

use crate::{CheckpointError, CheckpointStore, Result};

/// Checkpoint stored as a big-endian `u64` in a RocksDB database.
#[derive(Clone)]
pub struct RocksDbCheckpointStore {
    db: Arc<DB>,
    key: String,
}

impl std::fmt::Debug for RocksDbCheckpointStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbCheckpointStore").field("path", &self.db.path()).field("key", &self.key).finish()
    }
}

impl RocksDbCheckpointStore {
    pub fn open(path: &Path, key: impl Into<String>) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        let db = DB::open(&opts, path)?;
        Ok(Self { db: Arc::new(db), key: key.into() })
    }
}

/// RocksDB calls block the calling thread, so they run on the blocking pool.
#[async_trait]
impl CheckpointStore for RocksDbCheckpointStore {
    async fn load(&self) -> Result<Option<u64>> {
        let (db, key) = (Arc::clone(&self.db), self.key.clone());
        let Some(data) = task::spawn_blocking(move || db.get(key.as_bytes())).await?? else {
            return Ok(None);
        };
        let bytes: [u8; 8] = data[..]
            .try_into()
            .map_err(|_| CheckpointError::Malformed { location: self.location(), value: hex::encode(&data) })?;
        Ok(Some(u64::from_be_bytes(bytes)))
    }

    async fn store(&self, block_n: u64) -> Result<()> {
        let (db, key) = (Arc::clone(&self.db), self.key.clone());
        task::spawn_blocking(move || {
            let mut writeopts = WriteOptions::default();
            writeopts.set_sync(true);
            db.put_opt(key.as_bytes(), block_n.to_be_bytes(), &writeopts)
        })
        .await??;
        Ok(())
    }

    fn location(&self) -> String {
        format!("rocksdb://{}#{}", self.db.path().display(), self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::exercise_store;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn rocksdb_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        exercise_store(&RocksDbCheckpointStore::open(dir.path(), "last_synced_block").unwrap()).await;
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = RocksDbCheckpointStore::open(dir.path(), "k").unwrap();
            store.set(1234).await.unwrap();
        }
        let store = RocksDbCheckpointStore::open(dir.path(), "k").unwrap();
        assert_eq!(store.get().await.unwrap(), 1234);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn works_on_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbCheckpointStore::open(dir.path(), "k").unwrap();
        store.set(7).await.unwrap();
        store.set(8).await.unwrap();
        assert_eq!(store.get().await.unwrap(), 8);
    }

    #[tokio::test]
    async fn malformed_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = RocksDbCheckpointStore::open(dir.path(), "k").unwrap();
        store.db.put(b"k", b"abc").unwrap();
        assert_matches!(store.get().await, Err(CheckpointError::Malformed { value, .. }) if value == "616263");
    }
}
