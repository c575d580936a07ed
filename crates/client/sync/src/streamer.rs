use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ec_checkpoint::CheckpointStore;
use ep_utils::{fmt_option, ServiceContext, ServiceStateSender};
use serde::{Deserialize, Serialize};

use crate::{calculate_target_block, StreamerAdapter, SyncTarget};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamerEvent {
    Starting,
    SyncingTo { target: u64 },
    Synced { block_n: u64 },
    /// Nothing to sync, sleeping before polling the head again.
    Idle,
    /// A cycle failed and will be retried from the same checkpoint.
    CycleFailed,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamerConfig {
    /// Explicit start point. The checkpoint is initialized to the block before
    /// it, which fails if a checkpoint already exists.
    pub start_block: Option<u64>,
    /// Stop once this block has been exported.
    pub end_block: Option<u64>,
    /// Number of blocks to stay behind the chain head.
    pub lag: u64,
    /// Maximum number of blocks exported per cycle.
    pub block_batch_size: u64,
    /// Delay between two polls when there is nothing to sync.
    pub period: Duration,
    /// Log and retry failed cycles instead of stopping.
    pub retry_errors: bool,
}

impl Default for StreamerConfig {
    fn default() -> Self {
        Self {
            start_block: None,
            end_block: None,
            lag: 0,
            block_batch_size: 10,
            period: Duration::from_secs(10),
            retry_errors: true,
        }
    }
}

impl StreamerConfig {
    pub fn start_block(self, start_block: Option<u64>) -> Self {
        Self { start_block, ..self }
    }
    pub fn end_block(self, end_block: Option<u64>) -> Self {
        Self { end_block, ..self }
    }
    pub fn lag(self, lag: u64) -> Self {
        Self { lag, ..self }
    }
    pub fn block_batch_size(self, block_batch_size: u64) -> Self {
        Self { block_batch_size, ..self }
    }
    pub fn period(self, period: Duration) -> Self {
        Self { period, ..self }
    }
    pub fn retry_errors(self, retry_errors: bool) -> Self {
        Self { retry_errors, ..self }
    }
}

/// The top level sync state machine.
pub struct Streamer<A: StreamerAdapter> {
    adapter: A,
    checkpoint: Arc<dyn CheckpointStore>,
    config: StreamerConfig,
    service_state_sender: ServiceStateSender<StreamerEvent>,
    status: Option<StreamerEvent>,
}

impl<A: StreamerAdapter> Streamer<A> {
    pub fn new(adapter: A, checkpoint: Arc<dyn CheckpointStore>, config: StreamerConfig) -> Self {
        Self { adapter, checkpoint, config, service_state_sender: Default::default(), status: None }
    }

    /// For testing purposes, subscribe to the state transitions of the loop.
    pub fn with_service_state_sender(self, service_state_sender: ServiceStateSender<StreamerEvent>) -> Self {
        Self { service_state_sender, ..self }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn set_status(&mut self, status: StreamerEvent) {
        if self.status != Some(status) {
            self.service_state_sender.send(status);
            self.status = Some(status);
        }
    }

    /// Runs until `end_block` is reached, a cycle fails with `retry_errors`
    /// disabled, or `ctx` is cancelled. The adapter is opened once and closed
    /// on every exit path.
    pub async fn run(&mut self, ctx: ServiceContext) -> anyhow::Result<()> {
        self.set_status(StreamerEvent::Starting);
        self.adapter.open().await.context("Opening streamer adapter")?;

        let res = self.run_inner(&ctx).await;

        let closed = self.adapter.close().await.context("Closing streamer adapter");
        match (res, closed) {
            (Err(err), Err(close_err)) => {
                tracing::error!(error = format!("{close_err:#}"), "Failed to close streamer adapter after an error");
                Err(err)
            }
            (res, closed) => res.and(closed),
        }
    }

    async fn run_inner(&mut self, ctx: &ServiceContext) -> anyhow::Result<()> {
        if let Some(start_block) = self.config.start_block {
            self.checkpoint
                .initialize(start_block.saturating_sub(1))
                .await
                .with_context(|| format!("Initializing checkpoint for start block {start_block}"))?;
        }

        let mut last_synced = self.checkpoint.get().await.context("Reading checkpoint")?;
        tracing::info!(
            last_synced,
            end_block = %fmt_option(&self.config.end_block, "N/A"),
            lag = self.config.lag,
            block_batch_size = self.config.block_batch_size,
            "⛓️  Starting streaming sync"
        );

        while self.config.end_block.map_or(true, |end| last_synced < end) {
            let Some(cycle) = ctx.run_until_cancelled(self.export_next(last_synced)).await else {
                tracing::info!(last_synced, "Sync interrupted, last cycle was not checkpointed");
                return Ok(());
            };

            let synced = match Self::commit(self.checkpoint.as_ref(), cycle).await {
                Ok(Some(target)) => {
                    let synced = target - last_synced;
                    last_synced = target;
                    self.set_status(StreamerEvent::Synced { block_n: target });
                    synced
                }
                Ok(None) => 0,
                Err(err) if self.config.retry_errors => {
                    tracing::error!(error = format!("{err:#}"), last_synced, "An error occurred while syncing block data");
                    self.set_status(StreamerEvent::CycleFailed);
                    0
                }
                Err(err) => return Err(err),
            };

            if synced == 0 && self.config.end_block.map_or(true, |end| last_synced < end) {
                self.set_status(StreamerEvent::Idle);
                tracing::debug!(period_secs = self.config.period.as_secs(), "Nothing to sync, sleeping");
                if !ctx.sleep(self.config.period).await {
                    return Ok(());
                }
            }
        }

        tracing::info!(last_synced, "🏁 Reached end block");
        self.set_status(StreamerEvent::Finished);
        Ok(())
    }

    /// Exports the next range if any. Returns the new target once the range is
    /// fully exported, or [None] when there is nothing to do.
    async fn export_next(&mut self, last_synced: u64) -> anyhow::Result<Option<u64>> {
        let current_head = self.adapter.get_current_block_number().await.context("Getting current block number")?;
        let SyncTarget { target, to_sync } = calculate_target_block(
            current_head,
            last_synced,
            self.config.lag,
            self.config.block_batch_size,
            self.config.end_block,
        );

        tracing::info!(current_head, last_synced, target, to_sync, "Computed sync target");
        if to_sync == 0 {
            return Ok(None);
        }

        self.set_status(StreamerEvent::SyncingTo { target });
        self.adapter
            .export_all(last_synced + 1, target)
            .await
            .with_context(|| format!("Exporting blocks {} to {target}", last_synced + 1))?;
        Ok(Some(target))
    }

    /// Persists a successful cycle. Runs outside of cancellation so a started
    /// checkpoint write always completes.
    async fn commit(
        checkpoint: &dyn CheckpointStore,
        cycle: anyhow::Result<Option<u64>>,
    ) -> anyhow::Result<Option<u64>> {
        let Some(target) = cycle? else {
            return Ok(None);
        };
        checkpoint.set(target).await.with_context(|| format!("Writing checkpoint {target}"))?;
        tracing::info!(block_n = target, "💾 Checkpoint saved");
        Ok(Some(target))
    }
}
