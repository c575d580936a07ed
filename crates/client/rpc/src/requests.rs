//! Builders for the JSON-RPC calls issued by the extraction jobs.
use serde_json::json;

use crate::quantity::to_quantity;
use crate::JsonRpcRequest;

pub const ETH_BLOCK_NUMBER: &str = "eth_blockNumber";
pub const ETH_GET_BLOCK_BY_NUMBER: &str = "eth_getBlockByNumber";
pub const ETH_GET_TRANSACTION_RECEIPT: &str = "eth_getTransactionReceipt";
pub const ETH_GET_CODE: &str = "eth_getCode";
pub const ETH_GET_BALANCE: &str = "eth_getBalance";
pub const ETH_CALL: &str = "eth_call";
pub const TRACE_BLOCK: &str = "trace_block";
pub const DEBUG_TRACE_BLOCK_BY_NUMBER: &str = "debug_traceBlockByNumber";

pub fn block_number(id: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, ETH_BLOCK_NUMBER, json!([]))
}

pub fn get_block_by_number(id: u64, block_n: u64, full_transactions: bool) -> JsonRpcRequest {
    JsonRpcRequest::new(id, ETH_GET_BLOCK_BY_NUMBER, json!([to_quantity(block_n), full_transactions]))
}

pub fn get_transaction_receipt(id: u64, tx_hash: &str) -> JsonRpcRequest {
    JsonRpcRequest::new(id, ETH_GET_TRANSACTION_RECEIPT, json!([tx_hash]))
}

pub fn get_code(id: u64, address: &str, block_n: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, ETH_GET_CODE, json!([address, to_quantity(block_n)]))
}

pub fn get_balance(id: u64, address: &str, block_n: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, ETH_GET_BALANCE, json!([address, to_quantity(block_n)]))
}

pub fn call(id: u64, to: &str, data: &str, block_n: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, ETH_CALL, json!([{ "to": to, "data": data }, to_quantity(block_n)]))
}

pub fn trace_block(id: u64, block_n: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, TRACE_BLOCK, json!([to_quantity(block_n)]))
}

pub fn debug_trace_block_by_number(id: u64, block_n: u64) -> JsonRpcRequest {
    JsonRpcRequest::new(id, DEBUG_TRACE_BLOCK_BY_NUMBER, json!([to_quantity(block_n), { "tracer": "callTracer" }]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_are_hex_encoded() {
        let req = get_block_by_number(7, 16, true);
        assert_eq!(req.id, 7);
        assert_eq!(req.params, json!(["0x10", true]));

        let req = call(1, "0xtoken", "0x95d89b41", 255);
        assert_eq!(req.params, json!([{ "to": "0xtoken", "data": "0x95d89b41" }, "0xff"]));

        let req = debug_trace_block_by_number(2, 1);
        assert_eq!(req.method, DEBUG_TRACE_BLOCK_BY_NUMBER);
        assert_eq!(req.params[1]["tracer"], "callTracer");
    }
}
