use async_trait::async_trait;
use sqlx::any::{AnyPoolOptions, AnyRow};
use sqlx::{AnyPool, Row};

use crate::{CheckpointError, CheckpointStore, Result};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS sync_checkpoints (
    sync_id TEXT PRIMARY KEY,
    last_synced_block BIGINT NOT NULL
)
"#;

const SELECT_CHECKPOINT: &str = "SELECT last_synced_block FROM sync_checkpoints WHERE sync_id = $1";

const UPSERT_CHECKPOINT: &str = r#"
INSERT INTO sync_checkpoints (sync_id, last_synced_block)
VALUES ($1, $2)
ON CONFLICT (sync_id) DO UPDATE SET last_synced_block = excluded.last_synced_block
"#;

/// Checkpoint row in a relational database, keyed by a sync identifier so
/// several pipelines can share one table.
#[derive(Debug, Clone)]
pub struct SqlCheckpointStore {
    pool: AnyPool,
    sync_id: String,
}

impl SqlCheckpointStore {
    /// Connects to `url` (`postgres://...` or `sqlite://...`) and creates the
    /// checkpoint table if needed.
    pub async fn connect(url: &str, sync_id: impl Into<String>) -> Result<Self> {
        sqlx::any::install_default_drivers();
        let pool = AnyPoolOptions::new().max_connections(2).connect(url).await?;
        Self::from_pool(pool, sync_id).await
    }

    pub async fn from_pool(pool: AnyPool, sync_id: impl Into<String>) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool, sync_id: sync_id.into() })
    }
}

#[async_trait]
impl CheckpointStore for SqlCheckpointStore {
    async fn load(&self) -> Result<Option<u64>> {
        let row: Option<AnyRow> = sqlx::query(SELECT_CHECKPOINT).bind(&self.sync_id).fetch_optional(&self.pool).await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let value: i64 = row.try_get("last_synced_block")?;
        u64::try_from(value)
            .map(Some)
            .map_err(|_| CheckpointError::Malformed { location: self.location(), value: value.to_string() })
    }

    async fn store(&self, block_n: u64) -> Result<()> {
        let value = i64::try_from(block_n).map_err(|_| CheckpointError::OutOfRange(block_n))?;
        sqlx::query(UPSERT_CHECKPOINT).bind(&self.sync_id).bind(value).execute(&self.pool).await?;
        Ok(())
    }

    fn location(&self) -> String {
        format!("sql:sync_checkpoints/{}", self.sync_id)
    }
}
