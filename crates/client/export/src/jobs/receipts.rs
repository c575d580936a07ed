use std::sync::Arc;

use ec_rpc::quantity::{decimal_field, u64_field};
use ec_rpc::requests::{self, ETH_GET_TRANSACTION_RECEIPT};
use ec_rpc::{RpcClient, RpcError};
use ep_record::{json, EntityType, Record, Value};

use super::{error_record, str_field, JobContext, Produced};
use crate::ExportError;

pub(crate) const MISSING_RECEIPT: &str = "missing_receipt";

enum ReceiptOutcome {
    Found { receipt: Record, logs: Vec<Record> },
    Missing(Record),
}

pub(super) async fn export_receipts_and_logs(
    cx: &JobContext<'_>,
    transactions: &[Record],
) -> Result<Produced, ExportError> {
    let outcomes = cx
        .executor
        .execute(
            "receipts",
            transactions.iter().cloned(),
            |txs: Vec<Record>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = txs
                    .iter()
                    .enumerate()
                    .map(|(id, tx)| requests::get_transaction_receipt(id as u64, tx.get_str("hash").unwrap_or_default()))
                    .collect();
                let responses = client.batch(&batch).await?;

                txs.iter()
                    .zip(responses)
                    .map(|(tx, response)| match response.into_option(ETH_GET_TRANSACTION_RECEIPT) {
                        Ok(Some(receipt)) => map_receipt(&receipt, tx),
                        Ok(None) | Err(RpcError::MissingResult { .. }) => Ok(ReceiptOutcome::Missing(missing(tx))),
                        Err(err) => Err(err),
                    })
                    .collect::<Result<Vec<_>, RpcError>>()
            },
            None,
        )
        .await?;

    let mut produced_receipts = Vec::with_capacity(outcomes.len());
    let mut produced_logs = Vec::new();
    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            ReceiptOutcome::Found { receipt, logs } => {
                produced_receipts.push(receipt);
                produced_logs.extend(logs);
            }
            ReceiptOutcome::Missing(error) => errors.push(error),
        }
    }
    if !errors.is_empty() {
        tracing::warn!(missing = errors.len(), range = %cx.range, "Some transaction receipts are missing");
    }

    Ok(Produced {
        collections: vec![(EntityType::Receipt, produced_receipts), (EntityType::Log, produced_logs)],
        errors,
    })
}

fn missing(tx: &Record) -> Record {
    error_record(
        MISSING_RECEIPT,
        tx.get_u64("block_number").unwrap_or_default(),
        tx.get("block_timestamp").cloned().unwrap_or(Value::Null),
        json!({
            "method": ETH_GET_TRANSACTION_RECEIPT,
            "transaction_hash": tx.get("hash").cloned().unwrap_or(Value::Null),
        }),
    )
}

fn map_receipt(receipt: &Value, tx: &Record) -> Result<ReceiptOutcome, RpcError> {
    let block_timestamp = tx.get("block_timestamp").cloned().unwrap_or(Value::Null);

    let record = Record::new(EntityType::Receipt)
        .with("transaction_hash", str_field(receipt, "transactionHash"))
        .with("transaction_index", u64_field(receipt.get("transactionIndex"))?)
        .with("block_hash", str_field(receipt, "blockHash"))
        .with("block_number", u64_field(receipt.get("blockNumber"))?)
        .with("cumulative_gas_used", u64_field(receipt.get("cumulativeGasUsed"))?)
        .with("gas_used", u64_field(receipt.get("gasUsed"))?)
        .with("contract_address", str_field(receipt, "contractAddress"))
        .with("status", u64_field(receipt.get("status"))?)
        .with("effective_gas_price", decimal_field(receipt.get("effectiveGasPrice"))?)
        .with("block_timestamp", block_timestamp.clone());

    let logs = receipt
        .get("logs")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .map(|log| {
            Ok(Record::new(EntityType::Log)
                .with("log_index", u64_field(log.get("logIndex"))?)
                .with("transaction_hash", str_field(log, "transactionHash"))
                .with("transaction_index", u64_field(log.get("transactionIndex"))?)
                .with("block_hash", str_field(log, "blockHash"))
                .with("block_number", u64_field(log.get("blockNumber"))?)
                .with("address", str_field(log, "address"))
                .with("data", str_field(log, "data"))
                .with("topics", log.get("topics").cloned().unwrap_or_else(|| json!([])))
                .with("block_timestamp", block_timestamp.clone()))
        })
        .collect::<Result<_, RpcError>>()?;

    Ok(ReceiptOutcome::Found { receipt: record, logs })
}
