//! Cancellation context shared by every long running task.
//!
//! A [ServiceContext] carries a _global_ cancellation token, shared by the
//! whole process, and an optional _local_ token created with
//! [ServiceContext::child]. Cancelling the global scope stops everything,
//! cancelling a local scope only stops the tasks which inherited it.
//!
//! The sync loop races every cycle against [ServiceContext::cancelled] so that
//! a shutdown signal interrupts in-flight RPC calls without ever persisting a
//! partially exported range.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug, Default)]
pub struct ServiceContext {
    token_global: CancellationToken,
    token_local: Option<CancellationToken>,
}

impl ServiceContext {
    /// Creates a new [Default] [ServiceContext]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops all tasks under the same global context scope.
    pub fn cancel_global(&self) {
        tracing::info!("🔌 Gracefully shutting down");

        self.token_global.cancel();
    }

    /// Stops all tasks under the same local context scope.
    ///
    /// Without a local scope this is the same as [ServiceContext::cancel_global].
    pub fn cancel_local(&self) {
        self.token_local.as_ref().unwrap_or(&self.token_global).cancel();
    }

    /// Completes once this context is cancelled, either globally or locally.
    pub async fn cancelled(&self) {
        let token_local = self.token_local.as_ref().unwrap_or(&self.token_global);

        tokio::select! {
            _ = self.token_global.cancelled() => {},
            _ = token_local.cancelled() => {},
        }
    }

    #[inline(always)]
    pub fn is_cancelled(&self) -> bool {
        self.token_global.is_cancelled() || self.token_local.as_ref().map(|t| t.is_cancelled()).unwrap_or(false)
    }

    /// Runs a [Future] until this context is cancelled.
    ///
    /// # Cancellation safety
    ///
    /// The future is dropped at whatever await point it reached when
    /// cancellation happens. Callers must only pass futures whose side effects
    /// are either complete or absent at every await point.
    ///
    /// # Returns
    ///
    /// The return value of the future wrapped in [Some], or [None] if the
    /// context was cancelled.
    pub async fn run_until_cancelled<T, F>(&self, f: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        tokio::select! {
            res = f => Some(res),
            _ = self.cancelled() => None
        }
    }

    /// Sleeps for `duration`. Returns `false` if the context was cancelled
    /// before the delay elapsed.
    pub async fn sleep(&self, duration: Duration) -> bool {
        self.run_until_cancelled(tokio::time::sleep(duration)).await.is_some()
    }

    /// A token which fires when this context is cancelled, for APIs which
    /// take a bare [CancellationToken].
    pub fn token(&self) -> CancellationToken {
        self.token_local.as_ref().unwrap_or(&self.token_global).clone()
    }

    /// Creates a new [ServiceContext] as a child of the current context.
    ///
    /// Cancelling the child with [ServiceContext::cancel_local] does not affect
    /// the parent, while cancelling the parent cancels the child.
    pub fn child(&self) -> Self {
        let token_local = self.token_local.as_ref().unwrap_or(&self.token_global).child_token();

        Self { token_local: Some(token_local), ..Clone::clone(self) }
    }
}
