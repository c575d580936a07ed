use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("Checkpoint already initialized at block {current}, refusing to reset it to {requested}")]
    AlreadyInitialized { current: u64, requested: u64 },
    #[error("Checkpoint file error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Malformed checkpoint value {value:?} in {location}")]
    Malformed { location: String, value: String },
    #[error("Block number {0} does not fit in the checkpoint column")]
    OutOfRange(u64),
    #[error("SQL error: {0}")]
    Sql(#[from] sqlx::Error),
    #[error("Rocksdb error: {0:#}")]
    RocksDB(#[from] rocksdb::Error),
    #[error("Checkpoint task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
