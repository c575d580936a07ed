use async_trait::async_trait;
use ep_record::Record;

use crate::{Sink, SinkError};

/// Delivers every record to each inner sink, in order.
pub struct MultiSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn Sink>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Sink for MultiSink {
    async fn open(&mut self) -> Result<(), SinkError> {
        for sink in &mut self.sinks {
            sink.open().await?;
        }
        Ok(())
    }

    async fn export_item(&mut self, record: Record) -> Result<(), SinkError> {
        self.export_items(vec![record]).await
    }

    async fn export_items(&mut self, records: Vec<Record>) -> Result<(), SinkError> {
        let Some((last, rest)) = self.sinks.split_last_mut() else {
            return Ok(());
        };
        for sink in rest {
            sink.export_items(records.clone()).await?;
        }
        last.export_items(records).await
    }

    /// Closes every sink even if one fails, reporting the first failure.
    async fn close(&mut self) -> Result<(), SinkError> {
        let mut first_err = None;
        for sink in &mut self.sinks {
            if let Err(err) = sink.close().await {
                tracing::error!(error = %err, "Failed to close sink");
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemorySink;
    use assert_matches::assert_matches;
    use ep_record::EntityType;

    struct FailingClose;

    #[async_trait]
    impl Sink for FailingClose {
        async fn export_item(&mut self, _record: Record) -> Result<(), SinkError> {
            Ok(())
        }
        async fn close(&mut self) -> Result<(), SinkError> {
            Err(SinkError::NotOpen("failing"))
        }
    }

    #[tokio::test]
    async fn fans_out_to_every_sink() {
        let a = MemorySink::new();
        let b = MemorySink::new();
        let mut multi = MultiSink::new(vec![Box::new(a.clone()), Box::new(b.clone())]);

        multi.open().await.unwrap();
        multi
            .export_items(vec![Record::new(EntityType::Block).with("number", 1), Record::new(EntityType::Block)])
            .await
            .unwrap();
        multi.export_item(Record::new(EntityType::Log)).await.unwrap();
        multi.close().await.unwrap();

        assert_eq!(a.records(), b.records());
        assert_eq!(a.len(), 3);
        assert_eq!(a.lifecycle(), (1, 1));
    }

    #[tokio::test]
    async fn close_reaches_all_sinks_despite_failure() {
        let after = MemorySink::new();
        let mut multi = MultiSink::new(vec![Box::new(FailingClose), Box::new(after.clone())]);
        assert_matches!(multi.close().await, Err(SinkError::NotOpen("failing")));
        assert_eq!(after.lifecycle(), (0, 1));
    }
}
