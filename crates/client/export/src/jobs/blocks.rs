use std::sync::Arc;

use ec_rpc::quantity::{decimal_field, u64_field};
use ec_rpc::requests::{self, ETH_GET_BLOCK_BY_NUMBER};
use ec_rpc::{RpcClient, RpcError};
use ep_record::{EntityType, Record, Value};

use super::{str_field, JobContext, Produced};
use crate::ExportError;

pub(super) async fn export_blocks_and_transactions(cx: &JobContext<'_>) -> Result<Produced, ExportError> {
    let extracted = cx
        .executor
        .execute(
            "blocks",
            cx.range.iter(),
            |block_numbers: Vec<u64>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = block_numbers
                    .iter()
                    .enumerate()
                    .map(|(id, block_n)| requests::get_block_by_number(id as u64, *block_n, true))
                    .collect();
                let responses = client.batch(&batch).await?;

                responses
                    .into_iter()
                    .map(|response| {
                        // A block at or below the head the node reported must
                        // exist; null means the node is lagging behind itself.
                        let block = response
                            .into_option(ETH_GET_BLOCK_BY_NUMBER)?
                            .ok_or_else(|| RpcError::MissingResult { method: ETH_GET_BLOCK_BY_NUMBER.to_string() })?;
                        map_block(&block)
                    })
                    .collect::<Result<Vec<_>, RpcError>>()
            },
            None,
        )
        .await?;

    let mut blocks = Vec::with_capacity(extracted.len());
    let mut transactions = Vec::new();
    for (block, txs) in extracted {
        blocks.push(block);
        transactions.extend(txs);
    }
    tracing::debug!(blocks = blocks.len(), transactions = transactions.len(), range = %cx.range, "Extracted blocks");

    Ok(Produced {
        collections: vec![(EntityType::Block, blocks), (EntityType::Transaction, transactions)],
        errors: vec![],
    })
}

fn map_block(block: &Value) -> Result<(Record, Vec<Record>), RpcError> {
    let txs = block.get("transactions").and_then(Value::as_array).map(Vec::as_slice).unwrap_or_default();
    let timestamp = u64_field(block.get("timestamp"))?;

    let record = Record::new(EntityType::Block)
        .with("number", u64_field(block.get("number"))?)
        .with("hash", str_field(block, "hash"))
        .with("parent_hash", str_field(block, "parentHash"))
        .with("nonce", str_field(block, "nonce"))
        .with("sha3_uncles", str_field(block, "sha3Uncles"))
        .with("logs_bloom", str_field(block, "logsBloom"))
        .with("transactions_root", str_field(block, "transactionsRoot"))
        .with("state_root", str_field(block, "stateRoot"))
        .with("receipts_root", str_field(block, "receiptsRoot"))
        .with("miner", str_field(block, "miner"))
        .with("difficulty", decimal_field(block.get("difficulty"))?)
        .with("size", u64_field(block.get("size"))?)
        .with("extra_data", str_field(block, "extraData"))
        .with("gas_limit", u64_field(block.get("gasLimit"))?)
        .with("gas_used", u64_field(block.get("gasUsed"))?)
        .with("timestamp", timestamp.clone())
        .with("transaction_count", txs.len())
        .with("base_fee_per_gas", u64_field(block.get("baseFeePerGas"))?);

    let transactions = txs.iter().map(|tx| map_transaction(tx, &timestamp)).collect::<Result<_, _>>()?;
    Ok((record, transactions))
}

fn map_transaction(tx: &Value, block_timestamp: &Value) -> Result<Record, RpcError> {
    Ok(Record::new(EntityType::Transaction)
        .with("hash", str_field(tx, "hash"))
        .with("nonce", u64_field(tx.get("nonce"))?)
        .with("block_hash", str_field(tx, "blockHash"))
        .with("block_number", u64_field(tx.get("blockNumber"))?)
        .with("transaction_index", u64_field(tx.get("transactionIndex"))?)
        .with("from_address", str_field(tx, "from"))
        .with("to_address", str_field(tx, "to"))
        .with("value", decimal_field(tx.get("value"))?)
        .with("gas", u64_field(tx.get("gas"))?)
        .with("gas_price", decimal_field(tx.get("gasPrice"))?)
        .with("input", str_field(tx, "input"))
        .with("max_fee_per_gas", decimal_field(tx.get("maxFeePerGas"))?)
        .with("max_priority_fee_per_gas", decimal_field(tx.get("maxPriorityFeePerGas"))?)
        .with("transaction_type", u64_field(tx.get("type"))?)
        .with("block_timestamp", block_timestamp.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep_record::json;

    #[test]
    fn block_fields_are_decoded() {
        let block = json!({
            "number": "0x10",
            "hash": "0xb16",
            "parentHash": "0xb15",
            "timestamp": "0x5f5e100",
            "difficulty": "0xde0b6b3a7640000",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0x5208",
            "transactions": [{
                "hash": "0xt1",
                "nonce": "0x1",
                "blockHash": "0xb16",
                "blockNumber": "0x10",
                "transactionIndex": "0x0",
                "from": "0xa",
                "to": null,
                "value": "0x0",
                "gas": "0x5208",
                "gasPrice": "0x3b9aca00",
                "input": "0x",
                "type": "0x2"
            }]
        });

        let (record, txs) = map_block(&block).unwrap();
        assert_eq!(record.get("number"), Some(&json!(16)));
        assert_eq!(record.get("timestamp"), Some(&json!(100_000_000)));
        assert_eq!(record.get("difficulty"), Some(&json!("1000000000000000000")));
        assert_eq!(record.get("transaction_count"), Some(&json!(1)));
        assert_eq!(record.get("base_fee_per_gas"), Some(&Value::Null));

        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].get("to_address"), Some(&Value::Null));
        assert_eq!(txs[0].get("gas_price"), Some(&json!("1000000000")));
        assert_eq!(txs[0].get("transaction_type"), Some(&json!(2)));
        assert_eq!(txs[0].get("block_timestamp"), Some(&json!(100_000_000)));
    }
}
