use std::sync::Arc;

use ec_rpc::requests::{self, ETH_GET_CODE};
use ec_rpc::{RpcClient, RpcError};
use ep_record::{json, EntityType, Record, Value};

use super::{JobContext, Produced};
use crate::abi::{decode_hex, function_sighashes, is_erc20, is_erc721};
use crate::join::{join_checked, Projection};
use crate::ExportError;

/// Contracts deployed by successful `create` traces, classified from their
/// runtime bytecode.
pub(super) async fn export_contracts(
    cx: &JobContext<'_>,
    traces: &[Record],
    blocks: &[Record],
) -> Result<Produced, ExportError> {
    let created: Vec<Record> = traces
        .iter()
        .filter(|t| t.get_str("trace_type") == Some("create") && t.get_u64("status") == Some(1))
        .filter(|t| t.get_str("to_address").is_some())
        .cloned()
        .collect();

    let contracts = cx
        .executor
        .execute(
            "contracts",
            created,
            |traces: Vec<Record>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = traces
                    .iter()
                    .enumerate()
                    .map(|(id, trace)| {
                        requests::get_code(
                            id as u64,
                            trace.get_str("to_address").unwrap_or_default(),
                            trace.block_number().unwrap_or_default(),
                        )
                    })
                    .collect();
                let responses = client.batch(&batch).await?;

                traces
                    .iter()
                    .zip(responses)
                    .map(|(trace, response)| {
                        let code = response.into_result(ETH_GET_CODE)?;
                        let code = code.as_str().ok_or_else(|| RpcError::unexpected(ETH_GET_CODE, "expected a string"))?;
                        Ok(map_contract(trace, code))
                    })
                    .collect::<Result<Vec<_>, RpcError>>()
            },
            None,
        )
        .await?;

    let contracts = join_checked(
        "contract_block",
        &contracts,
        blocks,
        ("block_number", "number"),
        &Projection::All,
        &Projection::renamed(&[("hash", "block_hash")]),
    )?;
    Ok(Produced::single(EntityType::Contract, contracts))
}

fn map_contract(trace: &Record, bytecode: &str) -> Record {
    let sighashes = decode_hex(bytecode).map(|code| function_sighashes(&code)).unwrap_or_default();
    Record::new(EntityType::Contract)
        .with("address", trace.get("to_address").cloned().unwrap_or(Value::Null))
        .with("bytecode", bytecode)
        .with("is_erc20", is_erc20(&sighashes))
        .with("is_erc721", is_erc721(&sighashes))
        .with("function_sighashes", json!(sighashes))
        .with("block_number", trace.get("block_number").cloned().unwrap_or(Value::Null))
        .with("transaction_hash", trace.get("transaction_hash").cloned().unwrap_or(Value::Null))
}
