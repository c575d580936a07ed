//! Extraction jobs, one per [Producer].
//!
//! A job reads the collections it depends on from [Inputs], issues its RPC
//! work through the batch executor and returns every collection it yields at
//! once, along with the `error` records of the items it could not extract.
use std::collections::HashMap;
use std::sync::Arc;

use ep_record::{BlockRange, EntityType, Record, Value};

use crate::{ExportError, Producer, RpcExecutor};

pub(crate) mod balances;
mod blocks;
mod contracts;
mod geth_traces;
pub(crate) mod receipts;
mod token_transfers;
mod tokens;
mod traces;

/// Collections already extracted in the current session.
#[derive(Debug, Default)]
pub(crate) struct Inputs(HashMap<EntityType, Arc<Vec<Record>>>);

impl Inputs {
    pub fn insert(&mut self, kind: EntityType, records: Arc<Vec<Record>>) {
        self.0.insert(kind, records);
    }

    pub fn get(&self, kind: EntityType) -> &[Record] {
        self.0.get(&kind).map(|r| r.as_slice()).unwrap_or_default()
    }
}

#[derive(Debug, Default)]
pub(crate) struct Produced {
    pub collections: Vec<(EntityType, Vec<Record>)>,
    pub errors: Vec<Record>,
}

impl Produced {
    fn single(kind: EntityType, records: Vec<Record>) -> Self {
        Self { collections: vec![(kind, records)], errors: vec![] }
    }
}

pub(crate) struct JobContext<'a> {
    pub executor: &'a RpcExecutor,
    pub range: BlockRange,
}

pub(crate) async fn run(producer: Producer, cx: &JobContext<'_>, inputs: &Inputs) -> Result<Produced, ExportError> {
    match producer {
        Producer::BlocksAndTransactions => blocks::export_blocks_and_transactions(cx).await,
        Producer::ReceiptsAndLogs => receipts::export_receipts_and_logs(cx, inputs.get(EntityType::Transaction)).await,
        Producer::TokenTransfers => {
            token_transfers::extract_token_transfers(inputs.get(EntityType::Log), inputs.get(EntityType::Block))
        }
        Producer::Traces => traces::export_traces(cx, inputs.get(EntityType::Block)).await,
        Producer::GethTraces => {
            geth_traces::export_geth_traces(cx, inputs.get(EntityType::Transaction), inputs.get(EntityType::Block))
                .await
        }
        Producer::Contracts => {
            contracts::export_contracts(cx, inputs.get(EntityType::Trace), inputs.get(EntityType::Block)).await
        }
        Producer::Tokens => tokens::export_tokens(cx, inputs.get(EntityType::Contract)).await,
        Producer::InternalTransfers => Ok(traces::extract_internal_transfers(inputs.get(EntityType::Trace))),
        Producer::TokenBalances => balances::export_token_balances(cx, inputs.get(EntityType::TokenTransfer)).await,
        Producer::NativeBalances => {
            balances::export_native_balances(cx, inputs.get(EntityType::Transaction), inputs.get(EntityType::Block))
                .await
        }
    }
}

/// String field of a node response, null when absent.
pub(crate) fn str_field(value: &Value, key: &str) -> Value {
    match value.get(key) {
        Some(Value::String(s)) => Value::String(s.clone()),
        _ => Value::Null,
    }
}

/// A per-item extraction failure, exported as data.
pub(crate) fn error_record(kind: &str, block_number: u64, block_timestamp: Value, data: Value) -> Record {
    Record::new(EntityType::Error)
        .with("kind", kind)
        .with("block_number", block_number)
        .with("block_timestamp", block_timestamp)
        .with("data", data)
}
