use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::RpcError;

pub const JSONRPC_VERSION: &str = "2.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: JSONRPC_VERSION.to_string(), method: method.into(), params, id }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

impl JsonRpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self { jsonrpc: Some(JSONRPC_VERSION.to_string()), id: Some(id), result: Some(result), error: None }
    }

    pub fn failure(id: u64, error: JsonRpcErrorObject) -> Self {
        Self { jsonrpc: Some(JSONRPC_VERSION.to_string()), id: Some(id), result: None, error: Some(error) }
    }

    /// The result of the call, null included.
    ///
    /// An error object becomes [RpcError::Rpc]. A response carrying neither a
    /// result nor an error is reported as [RpcError::MissingResult].
    pub fn into_result(self, method: &str) -> Result<Value, RpcError> {
        match (self.result, self.error) {
            (_, Some(err)) => Err(RpcError::Rpc { code: err.code, message: err.message }),
            (Some(result), None) => Ok(result),
            (None, None) => Err(RpcError::MissingResult { method: method.to_string() }),
        }
    }

    /// Like [JsonRpcResponse::into_result], mapping a null result to [None].
    pub fn into_option(self, method: &str) -> Result<Option<Value>, RpcError> {
        self.into_result(method).map(|v| if v.is_null() { None } else { Some(v) })
    }
}
