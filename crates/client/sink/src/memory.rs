use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ep_record::Record;

use crate::{Sink, SinkError};

/// Keeps records in memory. Clones share the same buffer, so a clone kept by
/// the caller observes what the pipeline exported.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<Record>>>,
    opened: Arc<Mutex<usize>>,
    closed: Arc<Mutex<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
        m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn records(&self) -> Vec<Record> {
        Self::lock(&self.records).clone()
    }

    pub fn take(&self) -> Vec<Record> {
        std::mem::take(&mut *Self::lock(&self.records))
    }

    pub fn len(&self) -> usize {
        Self::lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `open` and `close` calls received.
    pub fn lifecycle(&self) -> (usize, usize) {
        (*Self::lock(&self.opened), *Self::lock(&self.closed))
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn open(&mut self) -> Result<(), SinkError> {
        *Self::lock(&self.opened) += 1;
        Ok(())
    }

    async fn export_item(&mut self, record: Record) -> Result<(), SinkError> {
        Self::lock(&self.records).push(record);
        Ok(())
    }

    async fn export_items(&mut self, records: Vec<Record>) -> Result<(), SinkError> {
        Self::lock(&self.records).extend(records);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        *Self::lock(&self.closed) += 1;
        Ok(())
    }
}
