use std::collections::HashMap;
use std::sync::Arc;

use ec_rpc::requests::{self, DEBUG_TRACE_BLOCK_BY_NUMBER};
use ec_rpc::{RpcClient, RpcError};
use ep_record::{sequence::sort_records, EntityType, Record, Value};

use super::{JobContext, Produced};
use crate::join::with_block_timestamp;
use crate::ExportError;

pub(super) async fn export_geth_traces(
    cx: &JobContext<'_>,
    transactions: &[Record],
    blocks: &[Record],
) -> Result<Produced, ExportError> {
    let mut by_block: HashMap<u64, Vec<Record>> = HashMap::new();
    for tx in transactions {
        if let Some(block_n) = tx.block_number() {
            by_block.entry(block_n).or_default().push(tx.clone());
        }
    }
    for txs in by_block.values_mut() {
        sort_records(EntityType::Transaction, txs);
    }

    let by_block = &by_block;
    let block_numbers: Vec<u64> = blocks.iter().filter_map(Record::block_number).collect();
    let traces = cx
        .executor
        .execute(
            "geth_traces",
            block_numbers,
            |block_numbers: Vec<u64>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = block_numbers
                    .iter()
                    .enumerate()
                    .map(|(id, block_n)| requests::debug_trace_block_by_number(id as u64, *block_n))
                    .collect();
                let responses = client.batch(&batch).await?;

                let mut records = Vec::new();
                for (block_n, response) in block_numbers.iter().zip(responses) {
                    let result = response.into_result(DEBUG_TRACE_BLOCK_BY_NUMBER)?;
                    let txs = by_block.get(block_n).map(Vec::as_slice).unwrap_or_default();
                    records.extend(map_block_traces(*block_n, &result, txs)?);
                }
                Ok::<_, RpcError>(records)
            },
            None,
        )
        .await?;

    let traces = with_block_timestamp("geth_trace_block", &traces, blocks)?;
    Ok(Produced::single(EntityType::GethTrace, traces))
}

/// One record per transaction. The node answers with one call tree per
/// transaction of the block, in block order.
fn map_block_traces(block_n: u64, result: &Value, txs: &[Record]) -> Result<Vec<Record>, RpcError> {
    let traces = result
        .as_array()
        .ok_or_else(|| RpcError::unexpected(DEBUG_TRACE_BLOCK_BY_NUMBER, "expected an array"))?;
    if traces.len() != txs.len() {
        return Err(RpcError::unexpected(
            DEBUG_TRACE_BLOCK_BY_NUMBER,
            format!("block {block_n} has {} transactions but {} traces", txs.len(), traces.len()),
        ));
    }

    Ok(txs
        .iter()
        .zip(traces)
        .map(|(tx, trace)| {
            let call_tree = trace.get("result").unwrap_or(trace).clone();
            Record::new(EntityType::GethTrace)
                .with("block_number", block_n)
                .with("transaction_hash", tx.get("hash").cloned().unwrap_or(Value::Null))
                .with("transaction_index", tx.get("transaction_index").cloned().unwrap_or(Value::Null))
                .with("transaction_traces", call_tree)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ep_record::json;

    fn tx(hash: &str, index: u64) -> Record {
        Record::new(EntityType::Transaction).with("hash", hash).with("transaction_index", index).with("block_number", 4)
    }

    #[test]
    fn traces_are_matched_to_transactions_by_position() {
        let txs = vec![tx("0xa", 0), tx("0xb", 1)];
        let result = json!([{ "result": { "type": "CALL", "calls": [] } }, { "txHash": "0xb", "result": { "type": "CREATE" } }]);

        let records = map_block_traces(4, &result, &txs).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("transaction_hash"), Some(&json!("0xa")));
        assert_eq!(records[1].get("transaction_traces"), Some(&json!({ "type": "CREATE" })));
    }

    #[test]
    fn trace_count_mismatch_is_rejected() {
        let txs = vec![tx("0xa", 0)];
        assert_matches!(map_block_traces(4, &json!([]), &txs), Err(RpcError::UnexpectedResponse { .. }));
    }
}
