use std::collections::BTreeMap;

use anyhow::Context;
use async_trait::async_trait;
use ec_rpc::RpcClient;
use ec_sink::Sink;
use ec_sync::StreamerAdapter;
use ep_record::{BlockRange, EntityType};
use ep_utils::{stopwatch_end, PerfStopwatch};

use crate::ExportPlanner;

/// Sync loop adapter reading from a JSON-RPC node and writing to a sink.
pub struct EthStreamerAdapter {
    client: RpcClient,
    planner: ExportPlanner,
    sink: Box<dyn Sink>,
    entity_types: Vec<EntityType>,
}

impl EthStreamerAdapter {
    /// `client` is only used to poll the chain head, extraction goes through
    /// the planner's own client pool.
    pub fn new(client: RpcClient, planner: ExportPlanner, sink: Box<dyn Sink>, entity_types: Vec<EntityType>) -> Self {
        Self { client, planner, sink, entity_types }
    }

    pub fn entity_types(&self) -> &[EntityType] {
        &self.entity_types
    }
}

#[async_trait]
impl StreamerAdapter for EthStreamerAdapter {
    async fn open(&mut self) -> anyhow::Result<()> {
        self.sink.open().await.context("Opening sink")
    }

    async fn get_current_block_number(&mut self) -> anyhow::Result<u64> {
        self.client.block_number().await.context("Querying chain head")
    }

    #[tracing::instrument(skip(self))]
    async fn export_all(&mut self, start_block: u64, end_block: u64) -> anyhow::Result<()> {
        let range = BlockRange::new(start_block, end_block)?;
        let sw = PerfStopwatch::new();

        let records = self.planner.export_all(range, &self.entity_types).await?;

        let mut counts: BTreeMap<EntityType, usize> = BTreeMap::new();
        for record in &records {
            *counts.entry(record.kind).or_default() += 1;
        }
        let total = records.len();

        self.sink.export_items(records).await.context("Delivering records to sink")?;

        stopwatch_end!(sw, "Exported {range} ({total} records) in {:?}");
        tracing::info!(%range, total, ?counts, "📦 Exported block range");
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.planner.shutdown();
        self.sink.close().await.context("Closing sink")
    }
}
