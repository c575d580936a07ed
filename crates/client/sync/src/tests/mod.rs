use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use ec_checkpoint::{CheckpointError, CheckpointStore, InMemoryCheckpointStore};
use ep_utils::{service_state_channel, ServiceContext};
use rstest::{fixture, rstest};

use crate::{Streamer, StreamerAdapter, StreamerConfig, StreamerEvent};

#[derive(Default)]
struct FakeChain {
    head: u64,
    exported: Vec<(u64, u64)>,
    opens: usize,
    closes: usize,
    /// Number of upcoming `export_all` calls which fail.
    failing_exports: usize,
    /// `export_all` never resolves once set.
    hang_exports: bool,
}

#[derive(Clone, Default)]
struct FakeAdapter(Arc<Mutex<FakeChain>>);

impl FakeAdapter {
    fn with_head(head: u64) -> Self {
        Self(Arc::new(Mutex::new(FakeChain { head, ..Default::default() })))
    }
    fn chain(&self) -> std::sync::MutexGuard<'_, FakeChain> {
        self.0.lock().unwrap()
    }
}

#[async_trait]
impl StreamerAdapter for FakeAdapter {
    async fn open(&mut self) -> anyhow::Result<()> {
        self.chain().opens += 1;
        Ok(())
    }

    async fn get_current_block_number(&mut self) -> anyhow::Result<u64> {
        Ok(self.chain().head)
    }

    async fn export_all(&mut self, start_block: u64, end_block: u64) -> anyhow::Result<()> {
        let hang = {
            let mut chain = self.chain();
            if chain.failing_exports > 0 {
                chain.failing_exports -= 1;
                anyhow::bail!("node unavailable");
            }
            chain.hang_exports
        };
        if hang {
            std::future::pending::<()>().await;
        }
        self.chain().exported.push((start_block, end_block));
        Ok(())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.chain().closes += 1;
        Ok(())
    }
}

#[fixture]
fn checkpoint() -> Arc<InMemoryCheckpointStore> {
    Arc::new(InMemoryCheckpointStore::new())
}

fn config() -> StreamerConfig {
    StreamerConfig::default().block_batch_size(10).period(Duration::from_secs(1))
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn syncs_to_end_block_in_batches(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().end_block(Some(25)));

    streamer.run(ServiceContext::new()).await.unwrap();

    let chain = adapter.chain();
    assert_eq!(chain.exported, vec![(1, 10), (11, 20), (21, 25)]);
    assert_eq!((chain.opens, chain.closes), (1, 1));
    assert_eq!(checkpoint.get().await.unwrap(), 25);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn start_block_initializes_checkpoint(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    let mut streamer =
        Streamer::new(adapter.clone(), checkpoint.clone(), config().start_block(Some(50)).end_block(Some(55)));

    streamer.run(ServiceContext::new()).await.unwrap();

    assert_eq!(adapter.chain().exported, vec![(50, 55)]);
    assert_eq!(checkpoint.get().await.unwrap(), 55);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn start_block_zero_starts_after_genesis(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    let mut streamer =
        Streamer::new(adapter.clone(), checkpoint.clone(), config().start_block(Some(0)).end_block(Some(3)));

    streamer.run(ServiceContext::new()).await.unwrap();

    assert_eq!(adapter.chain().exported, vec![(1, 3)]);
}

#[tokio::test(start_paused = true)]
async fn start_block_with_existing_checkpoint_fails_and_closes() {
    let checkpoint = Arc::new(InMemoryCheckpointStore::with_value(42));
    let adapter = FakeAdapter::with_head(100);
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().start_block(Some(10)));

    let err = streamer.run(ServiceContext::new()).await.unwrap_err();

    assert_matches!(
        err.downcast_ref::<CheckpointError>(),
        Some(CheckpointError::AlreadyInitialized { current: 42, requested: 9 })
    );
    let chain = adapter.chain();
    assert!(chain.exported.is_empty());
    assert_eq!((chain.opens, chain.closes), (1, 1));
    assert_eq!(checkpoint.get().await.unwrap(), 42);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_cycle_is_retried_from_unchanged_checkpoint(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    adapter.chain().failing_exports = 2;
    let (sender, mut events) = service_state_channel();
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().end_block(Some(20)))
        .with_service_state_sender(sender);

    streamer.run(ServiceContext::new()).await.unwrap();

    assert_eq!(adapter.chain().exported, vec![(1, 10), (11, 20)]);
    assert_eq!(checkpoint.get().await.unwrap(), 20);

    let mut seen = vec![];
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(
        seen,
        vec![
            StreamerEvent::Starting,
            StreamerEvent::SyncingTo { target: 10 },
            StreamerEvent::CycleFailed,
            StreamerEvent::Idle,
            StreamerEvent::SyncingTo { target: 10 },
            StreamerEvent::CycleFailed,
            StreamerEvent::Idle,
            StreamerEvent::SyncingTo { target: 10 },
            StreamerEvent::Synced { block_n: 10 },
            StreamerEvent::SyncingTo { target: 20 },
            StreamerEvent::Synced { block_n: 20 },
            StreamerEvent::Finished,
        ]
    );
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn failed_cycle_propagates_without_retry_errors(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    adapter.chain().failing_exports = 1;
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().retry_errors(false));

    let err = streamer.run(ServiceContext::new()).await.unwrap_err();

    assert!(format!("{err:#}").contains("node unavailable"));
    assert_eq!(adapter.chain().closes, 1);
    assert!(!checkpoint.exists().await.unwrap());
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn checkpoint_is_monotonic_across_cycles(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    let (sender, mut events) = service_state_channel();
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().end_block(Some(60)))
        .with_service_state_sender(sender);

    streamer.run(ServiceContext::new()).await.unwrap();

    let mut synced = vec![];
    while let Ok(event) = events.try_recv() {
        if let StreamerEvent::Synced { block_n } = event {
            synced.push(block_n);
        }
    }
    assert_eq!(synced, vec![10, 20, 30, 40, 50, 60]);
    assert!(synced.windows(2).all(|w| w[0] < w[1]));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn lag_keeps_distance_from_head(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(15);
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().lag(5));
    let ctx = ServiceContext::new();

    let run = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            streamer.run(ctx).await.unwrap();
        })
    };
    // One full idle period is enough to reach the lagged head.
    tokio::time::sleep(Duration::from_secs(5)).await;
    ctx.cancel_global();
    run.await.unwrap();

    assert_eq!(adapter.chain().exported, vec![(1, 10)]);
    assert_eq!(checkpoint.get().await.unwrap(), 10);
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn head_behind_lag_never_exports(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(5);
    let (sender, mut events) = service_state_channel();
    let mut streamer = Streamer::new(adapter.clone(), checkpoint.clone(), config().lag(10))
        .with_service_state_sender(sender);
    let ctx = ServiceContext::new();

    let run = {
        let ctx = ctx.clone();
        tokio::spawn(async move { streamer.run(ctx).await })
    };
    tokio::time::sleep(Duration::from_secs(10)).await;
    ctx.cancel_global();
    run.await.unwrap().unwrap();

    assert!(adapter.chain().exported.is_empty());
    assert!(!checkpoint.exists().await.unwrap());
    assert_eq!(events.recv().await, Some(StreamerEvent::Starting));
    assert_eq!(events.recv().await, Some(StreamerEvent::Idle));
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn cancellation_during_export_skips_checkpoint(checkpoint: Arc<InMemoryCheckpointStore>) {
    let adapter = FakeAdapter::with_head(100);
    adapter.chain().hang_exports = true;
    let (sender, mut events) = service_state_channel();
    let mut streamer =
        Streamer::new(adapter.clone(), checkpoint.clone(), config()).with_service_state_sender(sender);
    let ctx = ServiceContext::new();

    let run = {
        let ctx = ctx.clone();
        tokio::spawn(async move { streamer.run(ctx).await })
    };
    assert_eq!(events.recv().await, Some(StreamerEvent::Starting));
    assert_eq!(events.recv().await, Some(StreamerEvent::SyncingTo { target: 10 }));
    ctx.cancel_global();
    run.await.unwrap().unwrap();

    let chain = adapter.chain();
    assert!(chain.exported.is_empty());
    assert_eq!(chain.closes, 1);
    assert!(!checkpoint.exists().await.unwrap());
}
