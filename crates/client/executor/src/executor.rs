use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ep_resilience::{Classify, RetryState};
use ep_utils::ServiceContext;
use futures::{stream, StreamExt};

use crate::{ClientPool, ExecutorConfig, ProgressLogger};

#[derive(Debug, thiserror::Error)]
pub enum ExecutorError<E> {
    #[error(transparent)]
    Work(E),
    #[error("Batch still failing after {retries} retries: {source}")]
    RetriesExhausted { retries: usize, source: E },
    #[error("Batch work was cancelled")]
    Cancelled,
    #[error("Executor has been shut down")]
    ShutDown,
}

enum BatchFailure<E> {
    TooLarge,
    Failed(ExecutorError<E>),
}

/// Runs a work function over batches of items with bounded concurrency.
///
/// Each in-flight batch owns a client from the pool for its whole duration,
/// retries included. Transient failures are retried with backoff, a batch
/// the remote side finds too large is split in two, any other failure aborts
/// the whole execution and drops the batches still in flight.
pub struct BatchWorkExecutor<C> {
    config: ExecutorConfig,
    pool: ClientPool<Arc<C>>,
    ctx: ServiceContext,
    shut_down: AtomicBool,
}

impl<C> BatchWorkExecutor<C> {
    pub fn new(config: ExecutorConfig, ctx: &ServiceContext, mut factory: impl FnMut(usize) -> C) -> Self {
        let pool = ClientPool::new(config.max_workers, |i| Arc::new(factory(i)));
        Self::with_pool(config, ctx, pool)
    }

    pub fn try_new<E>(
        config: ExecutorConfig,
        ctx: &ServiceContext,
        mut factory: impl FnMut(usize) -> Result<C, E>,
    ) -> Result<Self, E> {
        let pool = ClientPool::try_new(config.max_workers, |i| factory(i).map(Arc::new))?;
        Ok(Self::with_pool(config, ctx, pool))
    }

    fn with_pool(config: ExecutorConfig, ctx: &ServiceContext, pool: ClientPool<Arc<C>>) -> Self {
        Self { config, pool, ctx: ctx.child(), shut_down: AtomicBool::new(false) }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Stops in-flight retries and refuses further work. Safe to call more
    /// than once.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(max_workers = self.config.max_workers, "Shutting down batch executor");
        self.ctx.cancel_local();
        self.pool.close();
    }

    /// Runs `work_fn` over `items` split into batches of `batch_size` and
    /// returns the concatenated results in input order.
    ///
    /// `total_items` is only used for progress reporting and defaults to the
    /// number of items.
    pub async fn execute<T, R, E, F, Fut>(
        &self,
        name: &'static str,
        items: impl IntoIterator<Item = T>,
        work_fn: F,
        total_items: Option<usize>,
    ) -> Result<Vec<R>, ExecutorError<E>>
    where
        T: Clone,
        E: Classify + std::fmt::Display,
        F: Fn(Vec<T>, Arc<C>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
    {
        if self.is_shut_down() {
            return Err(ExecutorError::ShutDown);
        }

        let items: Vec<T> = items.into_iter().collect();
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let batches: Vec<Vec<T>> = items.chunks(self.config.batch_size.max(1)).map(<[T]>::to_vec).collect();
        let progress = ProgressLogger::new(name, Some(total_items.unwrap_or(items.len())));
        let mut results: Vec<Option<Vec<R>>> = std::iter::repeat_with(|| None).take(batches.len()).collect();

        let work_fn = &work_fn;
        let mut running = stream::iter(batches.into_iter().enumerate())
            .map(|(index, batch)| async move {
                let len = batch.len();
                (index, len, self.run_batch(batch, work_fn).await)
            })
            .buffer_unordered(self.pool.size());

        while let Some((index, len, res)) = running.next().await {
            // Returning early drops the stream, cancelling outstanding batches.
            results[index] = Some(res?);
            progress.track(len);
        }

        Ok(results.into_iter().flatten().flatten().collect())
    }

    async fn run_batch<T, R, E, F, Fut>(&self, batch: Vec<T>, work_fn: &F) -> Result<Vec<R>, ExecutorError<E>>
    where
        T: Clone,
        E: Classify + std::fmt::Display,
        F: Fn(Vec<T>, Arc<C>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
    {
        let mut pending = VecDeque::from([batch]);
        let mut out = Vec::new();

        while let Some(batch) = pending.pop_front() {
            match self.run_with_retry(&batch, work_fn).await {
                Ok(res) => out.extend(res),
                Err(BatchFailure::TooLarge) => {
                    let mid = batch.len() / 2;
                    tracing::debug!(batch_size = batch.len(), "Batch rejected as too large, splitting");
                    pending.push_front(batch[mid..].to_vec());
                    pending.push_front(batch[..mid].to_vec());
                }
                Err(BatchFailure::Failed(err)) => return Err(err),
            }
        }

        Ok(out)
    }

    async fn run_with_retry<T, R, E, F, Fut>(&self, batch: &[T], work_fn: &F) -> Result<Vec<R>, BatchFailure<E>>
    where
        T: Clone,
        E: Classify + std::fmt::Display,
        F: Fn(Vec<T>, Arc<C>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
    {
        let mut retry = RetryState::new(self.config.retry.clone());

        loop {
            let client = self.pool.checkout().await.ok_or(BatchFailure::Failed(ExecutorError::ShutDown))?;
            let res = self.ctx.run_until_cancelled(work_fn(batch.to_vec(), Arc::clone(&client))).await;
            drop(client);

            let err = match res {
                Some(Ok(out)) => return Ok(out),
                Some(Err(err)) => err,
                None => return Err(BatchFailure::Failed(ExecutorError::Cancelled)),
            };

            if err.is_too_large() && batch.len() > 1 {
                return Err(BatchFailure::TooLarge);
            }
            if !err.is_transient() {
                return Err(BatchFailure::Failed(ExecutorError::Work(err)));
            }
            if retry.is_exhausted() {
                let retries = retry.get_retry_count();
                return Err(BatchFailure::Failed(ExecutorError::RetriesExhausted { retries, source: err }));
            }

            let attempt = retry.increment_retry();
            let delay = retry.next_delay();
            if retry.should_log() {
                tracing::warn!(
                    attempt,
                    max_retries = retry.max_retries(),
                    delay_ms = delay.as_millis() as u64,
                    batch_size = batch.len(),
                    error = %err,
                    "Retrying batch after transient error"
                );
            }
            if !self.ctx.sleep(delay).await {
                return Err(BatchFailure::Failed(ExecutorError::Cancelled));
            }
        }
    }
}

impl<C> Drop for BatchWorkExecutor<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
