use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::{CheckpointStore, Result};

/// Volatile checkpoint, for tests and one-shot exports.
#[derive(Debug, Default)]
pub struct InMemoryCheckpointStore {
    value: RwLock<Option<u64>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(block_n: u64) -> Self {
        Self { value: RwLock::new(Some(block_n)) }
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self) -> Result<Option<u64>> {
        Ok(*self.value.read().await)
    }

    async fn store(&self, block_n: u64) -> Result<()> {
        *self.value.write().await = Some(block_n);
        Ok(())
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::exercise_store;

    #[tokio::test]
    async fn memory_store_contract() {
        exercise_store(&InMemoryCheckpointStore::new()).await;
    }
}
