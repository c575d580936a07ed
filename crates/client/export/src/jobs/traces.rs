use std::collections::HashMap;
use std::sync::Arc;

use ec_rpc::quantity::{decimal_field, u64_field};
use ec_rpc::requests::{self, TRACE_BLOCK};
use ec_rpc::{RpcClient, RpcError};
use ep_record::{json, EntityType, Record, Value};

use super::{str_field, JobContext, Produced};
use crate::join::with_block_timestamp;
use crate::ExportError;

const NON_TRANSFERRING_CALLS: [&str; 3] = ["delegatecall", "staticcall", "callcode"];

pub(super) async fn export_traces(cx: &JobContext<'_>, blocks: &[Record]) -> Result<Produced, ExportError> {
    let block_numbers: Vec<u64> = blocks.iter().filter_map(Record::block_number).collect();
    let traces = cx
        .executor
        .execute(
            "traces",
            block_numbers,
            |block_numbers: Vec<u64>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = block_numbers
                    .iter()
                    .enumerate()
                    .map(|(id, block_n)| requests::trace_block(id as u64, *block_n))
                    .collect();
                let responses = client.batch(&batch).await?;

                let mut traces = Vec::new();
                for (block_n, response) in block_numbers.iter().zip(responses) {
                    let result = response.into_result(TRACE_BLOCK)?;
                    let raw = result.as_array().ok_or_else(|| RpcError::unexpected(TRACE_BLOCK, "expected an array"))?;
                    traces.extend(map_block_traces(*block_n, raw)?);
                }
                Ok::<_, RpcError>(traces)
            },
            None,
        )
        .await?;

    let traces = with_block_timestamp("trace_block", &traces, blocks)?;
    Ok(Produced::single(EntityType::Trace, traces))
}

fn trace_address(raw: &Value) -> Vec<u64> {
    raw.get("traceAddress").and_then(Value::as_array).map(|a| a.iter().filter_map(Value::as_u64).collect()).unwrap_or_default()
}

/// Maps the traces of one block, in node order.
///
/// Transaction traces are identified by type, transaction and position in
/// the call tree. Block level traces (rewards) have neither and are numbered
/// per type within the block instead. A trace inherits the failure of any of
/// its ancestors.
fn map_block_traces(block_n: u64, raw: &[Value]) -> Result<Vec<Record>, RpcError> {
    let mut failed: HashMap<String, Vec<Vec<u64>>> = HashMap::new();
    for trace in raw {
        if trace.get("error").is_some_and(|e| !e.is_null()) {
            if let Some(tx_hash) = trace.get("transactionHash").and_then(Value::as_str) {
                failed.entry(tx_hash.to_string()).or_default().push(trace_address(trace));
            }
        }
    }

    let mut block_level_counts: HashMap<String, u64> = HashMap::new();
    let mut records = Vec::with_capacity(raw.len());
    for (trace_index, trace) in raw.iter().enumerate() {
        let action = trace.get("action").unwrap_or(&Value::Null);
        let result = trace.get("result").unwrap_or(&Value::Null);
        let trace_type = trace.get("type").and_then(Value::as_str).unwrap_or_default().to_string();
        let address = trace_address(trace);
        let tx_hash = trace.get("transactionHash").and_then(Value::as_str);

        let (from, to, input, output) = match trace_type.as_str() {
            "call" => (
                str_field(action, "from"),
                str_field(action, "to"),
                str_field(action, "input"),
                str_field(result, "output"),
            ),
            "create" => (
                str_field(action, "from"),
                str_field(result, "address"),
                str_field(action, "init"),
                str_field(result, "code"),
            ),
            "suicide" => (str_field(action, "address"), str_field(action, "refundAddress"), Value::Null, Value::Null),
            "reward" => (Value::Null, str_field(action, "author"), Value::Null, Value::Null),
            _ => (Value::Null, Value::Null, Value::Null, Value::Null),
        };
        let value = match trace_type.as_str() {
            "suicide" => decimal_field(action.get("balance"))?,
            _ => decimal_field(action.get("value"))?,
        };

        let status = match tx_hash.and_then(|h| failed.get(h)) {
            Some(failures) if failures.iter().any(|f| address.starts_with(f)) => 0,
            _ => 1,
        };

        let trace_id = match tx_hash {
            Some(tx_hash) => {
                let path: Vec<String> = address.iter().map(u64::to_string).collect();
                format!("{trace_type}_{tx_hash}_{}", path.join("_"))
            }
            None => {
                let n = block_level_counts.entry(trace_type.clone()).or_default();
                let id = format!("{trace_type}_{block_n}_{n}");
                *n += 1;
                id
            }
        };

        records.push(
            Record::new(EntityType::Trace)
                .with("block_number", block_n)
                .with("transaction_hash", tx_hash)
                .with("transaction_index", u64_field(trace.get("transactionPosition"))?)
                .with("from_address", from)
                .with("to_address", to)
                .with("value", value)
                .with("input", input)
                .with("output", output)
                .with("trace_type", trace_type.clone())
                .with("call_type", str_field(action, "callType"))
                .with("reward_type", str_field(action, "rewardType"))
                .with("gas", u64_field(action.get("gas"))?)
                .with("gas_used", u64_field(result.get("gasUsed"))?)
                .with("subtraces", trace.get("subtraces").cloned().unwrap_or(json!(0)))
                .with("trace_address", json!(address))
                .with("error", str_field(trace, "error"))
                .with("status", status)
                .with("trace_id", trace_id)
                .with("trace_index", trace_index),
        );
    }
    Ok(records)
}

fn is_internal_transfer(trace: &Record) -> bool {
    let has_value = trace.get_str("value").is_some_and(|v| v != "0");
    let nested = trace.get("trace_address").and_then(Value::as_array).is_some_and(|a| !a.is_empty());
    let succeeded = trace.get_u64("status") == Some(1);
    let transfers_value = trace.get_str("call_type").map_or(true, |c| !NON_TRANSFERRING_CALLS.contains(&c));
    has_value && nested && succeeded && transfers_value
}

/// Value moved between accounts by successful nested calls.
pub(super) fn extract_internal_transfers(traces: &[Record]) -> Produced {
    const FIELDS: [&str; 8] = [
        "block_number",
        "transaction_hash",
        "from_address",
        "to_address",
        "value",
        "trace_id",
        "trace_index",
        "block_timestamp",
    ];

    let transfers = traces
        .iter()
        .filter(|t| is_internal_transfer(t))
        .map(|t| {
            FIELDS.iter().fold(Record::new(EntityType::InternalTransfer), |record, field| {
                record.with(*field, t.get(field).cloned().unwrap_or(Value::Null))
            })
        })
        .collect();
    Produced::single(EntityType::InternalTransfer, transfers)
}
