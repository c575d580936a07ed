use ep_resilience::{Classify, FailureKind};

#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Node answered with HTTP status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to decode node response: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("JSON-RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("No response for request id {id} in batch")]
    MissingResponse { id: u64 },
    #[error("Response to {method} has neither a result nor an error")]
    MissingResult { method: String },
    #[error("Invalid quantity {0:?}")]
    InvalidQuantity(String),
    #[error("Unexpected response to {method}: {reason}")]
    UnexpectedResponse { method: String, reason: String },
}

impl RpcError {
    pub fn unexpected(method: &str, reason: impl Into<String>) -> Self {
        Self::UnexpectedResponse { method: method.to_string(), reason: reason.into() }
    }

    /// The node rejected the batch because of its size. The caller may retry
    /// with smaller batches.
    pub fn is_batch_too_large(&self) -> bool {
        match self {
            RpcError::Status { status, .. } => *status == 413,
            RpcError::Rpc { message, .. } => {
                let message = message.to_lowercase();
                message.contains("batch") && (message.contains("too large") || message.contains("limit"))
            }
            _ => false,
        }
    }
}

impl Classify for RpcError {
    fn failure_kind(&self) -> FailureKind {
        match self {
            RpcError::Http(_) | RpcError::Decode(_) | RpcError::MissingResponse { .. } => FailureKind::Transient,
            RpcError::MissingResult { .. } => FailureKind::Transient,
            RpcError::Status { status, .. } if *status == 429 || *status >= 500 => FailureKind::Transient,
            // Internal error and the implementation defined server error range.
            RpcError::Rpc { code, .. } if *code == -32603 || (-32099..=-32000).contains(code) => FailureKind::Transient,
            _ => FailureKind::Fatal,
        }
    }

    fn is_too_large(&self) -> bool {
        self.is_batch_too_large()
    }
}
