use ec_executor::ExecutorError;
use ec_rpc::RpcError;
use ec_sink::SinkError;
use ep_record::{EntityType, InvalidBlockRange};
use ep_resilience::{Classify, FailureKind};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Executor(#[from] ExecutorError<RpcError>),
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error(transparent)]
    Sink(#[from] SinkError),
    #[error(transparent)]
    InvalidRange(#[from] InvalidBlockRange),
    #[error("Join {relation} changed cardinality: expected {expected} records, got {actual}")]
    CardinalityMismatch { relation: &'static str, expected: usize, actual: usize },
    #[error("No producer yields {0}")]
    NoProducer(EntityType),
    #[error("Dependency cycle through {0}")]
    Cycle(EntityType),
}

impl Classify for ExportError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            ExportError::Executor(ExecutorError::Work(err)) | ExportError::Rpc(err) => err.failure_kind(),
            ExportError::Executor(ExecutorError::Cancelled) => FailureKind::Transient,
            // Exhausted retries, invariant violations and bad wiring are not
            // fixed by trying again.
            _ => FailureKind::Fatal,
        }
    }
}
