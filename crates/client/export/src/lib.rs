//! Per-cycle export pipeline.
//!
//! For one block range, the [ExportPlanner] resolves the closure of the
//! requested entity types over the [DependencyGraph], runs every extraction
//! job at most once through the batch executor, enriches the resulting
//! collections with [join] and returns a deterministically ordered stream of
//! records. [EthStreamerAdapter] plugs the planner into the sync loop.
mod abi;
mod adapter;
mod error;
mod graph;
mod jobs;
pub mod join;
mod planner;

#[cfg(test)]
mod tests;

pub use adapter::EthStreamerAdapter;
pub use error::ExportError;
pub use graph::{DependencyGraph, Producer};
pub use planner::{ExportOptions, ExportPlanner, ExportSession};

/// Executor every extraction job goes through, one pooled client per worker.
pub type RpcExecutor = ec_executor::BatchWorkExecutor<ec_rpc::RpcClient>;
