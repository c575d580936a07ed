use async_trait::async_trait;

/// Source side of the sync loop.
///
/// `export_all` delivers the records of an inclusive block range to the
/// adapter's sinks as a side effect. The loop calls `open` once before the
/// first cycle and `close` once on every exit path.
#[async_trait]
pub trait StreamerAdapter: Send {
    async fn open(&mut self) -> anyhow::Result<()>;

    async fn get_current_block_number(&mut self) -> anyhow::Result<u64>;

    async fn export_all(&mut self, start_block: u64, end_block: u64) -> anyhow::Result<()>;

    async fn close(&mut self) -> anyhow::Result<()>;
}
