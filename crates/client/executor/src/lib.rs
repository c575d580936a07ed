//! Bounded pool of workers processing items in fixed size batches.
//!
//! The [BatchWorkExecutor] partitions its input into batches of
//! `batch_size`, runs at most `max_workers` of them concurrently, and hands
//! each running batch a client checked out of its [ClientPool]. Results are
//! returned in input order.
mod config;
mod executor;
mod pool;
mod progress;

pub use config::ExecutorConfig;
pub use executor::{BatchWorkExecutor, ExecutorError};
pub use pool::{ClientPool, PooledClient};
pub use progress::ProgressLogger;
