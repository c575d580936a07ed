use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use url::Url;

use crate::{JsonRpcRequest, JsonRpcResponse, RpcError};

/// Sends a batch of requests in a single round trip.
///
/// Implementations return the responses as received; re-ordering and
/// completeness checks are done by [crate::RpcClient].
#[async_trait]
pub trait BatchTransport: Send + Sync {
    async fn send_batch(&self, requests: &[JsonRpcRequest]) -> Result<Vec<JsonRpcResponse>, RpcError>;
}

/// JSON-RPC over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
}

impl HttpTransport {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl BatchTransport for HttpTransport {
    #[tracing::instrument(skip(self, requests), fields(batch_size = requests.len()))]
    async fn send_batch(&self, requests: &[JsonRpcRequest]) -> Result<Vec<JsonRpcResponse>, RpcError> {
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let response = self.client.post(self.url.clone()).json(requests).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(RpcError::Status { status: status.as_u16(), body: String::from_utf8_lossy(&body).into_owned() });
        }

        // Some nodes reject a whole batch with a single error object.
        match serde_json::from_slice::<Value>(&body)? {
            Value::Array(items) => Ok(items.into_iter().map(serde_json::from_value).collect::<Result<_, _>>()?),
            other => {
                let single: JsonRpcResponse = serde_json::from_value(other)?;
                match single.error {
                    Some(err) => Err(RpcError::Rpc { code: err.code, message: err.message }),
                    None => Ok(vec![single]),
                }
            }
        }
    }
}
