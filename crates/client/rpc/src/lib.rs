//! JSON-RPC batch client for Ethereum compatible nodes.
//!
//! Every extraction job talks to the node through an [RpcClient], which sends
//! a whole batch of [JsonRpcRequest]s in one round trip and hands back the
//! responses in request order, whatever order the node answered in.
mod client;
mod error;
pub mod quantity;
pub mod requests;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
mod transport;
mod types;

pub use client::RpcClient;
pub use error::RpcError;
pub use transport::{BatchTransport, HttpTransport};
pub use types::{JsonRpcErrorObject, JsonRpcRequest, JsonRpcResponse};
