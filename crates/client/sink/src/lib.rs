//! Destinations for exported records.
//!
//! Sinks are selected with an explicit [SinkKind] and built by [build_sinks].
//! Every sink receives records already sorted and stamped with their identity;
//! it only has to serialize and deliver them.
use async_trait::async_trait;
use ep_record::Record;

mod json_lines;
mod kind;
mod memory;
mod multi;

pub use json_lines::{ConsoleSink, FileSink};
pub use kind::{build_sink, build_sinks, SinkKind};
pub use memory::MemorySink;
pub use multi::MultiSink;

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("Sink {0} used before being opened")]
    NotOpen(&'static str),
    #[error("Invalid sink {0:?}, expected `console` or `file:<path>`")]
    InvalidKind(String),
}

#[async_trait]
pub trait Sink: Send + Sync {
    async fn open(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Delivers a single record. Errors are unrecoverable for the current
    /// cycle.
    async fn export_item(&mut self, record: Record) -> Result<(), SinkError>;

    async fn export_items(&mut self, records: Vec<Record>) -> Result<(), SinkError> {
        for record in records {
            self.export_item(record).await?;
        }
        Ok(())
    }

    /// Flushes anything buffered and releases resources.
    async fn close(&mut self) -> Result<(), SinkError>;
}
