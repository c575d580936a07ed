use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::{requests, BatchTransport, JsonRpcRequest, JsonRpcResponse, RpcError};

/// Batch JSON-RPC client.
///
/// Cheap to clone; clones share the underlying transport.
#[derive(Clone)]
pub struct RpcClient {
    transport: Arc<dyn BatchTransport>,
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient").finish_non_exhaustive()
    }
}

impl RpcClient {
    pub fn new(transport: impl BatchTransport + 'static) -> Self {
        Self { transport: Arc::new(transport) }
    }

    pub fn from_arc(transport: Arc<dyn BatchTransport>) -> Self {
        Self { transport }
    }

    /// Sends `requests` as one batch and returns the responses in request
    /// order. Request ids must be unique within the batch.
    pub async fn batch(&self, requests: &[JsonRpcRequest]) -> Result<Vec<JsonRpcResponse>, RpcError> {
        let responses = self.transport.send_batch(requests).await?;
        order_responses(requests, responses)
    }

    /// Single call, through the same batch path.
    pub async fn call(&self, request: JsonRpcRequest) -> Result<Value, RpcError> {
        let method = request.method.clone();
        let mut responses = self.batch(std::slice::from_ref(&request)).await?;
        responses.pop().ok_or(RpcError::MissingResponse { id: request.id })?.into_result(&method)
    }

    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result = self.call(requests::block_number(0)).await?;
        crate::quantity::parse_u64(&result)
    }
}

/// Restores request order using the response ids.
pub(crate) fn order_responses(
    requests: &[JsonRpcRequest],
    responses: Vec<JsonRpcResponse>,
) -> Result<Vec<JsonRpcResponse>, RpcError> {
    let mut by_id: HashMap<u64, JsonRpcResponse> = HashMap::with_capacity(responses.len());
    for response in responses {
        match response.id {
            Some(id) => {
                by_id.insert(id, response);
            }
            None => {
                // A response without id can only be a batch level failure.
                if let Some(err) = response.error {
                    return Err(RpcError::Rpc { code: err.code, message: err.message });
                }
                tracing::debug!("Dropping JSON-RPC response without id");
            }
        }
    }

    requests.iter().map(|req| by_id.remove(&req.id).ok_or(RpcError::MissingResponse { id: req.id })).collect()
}
