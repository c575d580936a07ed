use std::sync::Arc;

use ec_rpc::requests::{self, ETH_CALL};
use ec_rpc::{JsonRpcResponse, RpcClient, RpcError};
use ep_record::{EntityType, Record, Value};

use super::{JobContext, Produced};
use crate::abi::{decode_hex, decode_string, decode_uint256, DECIMALS, NAME, SYMBOL, TOTAL_SUPPLY};
use crate::ExportError;

const METADATA_CALLS: [&str; 4] = [SYMBOL, NAME, DECIMALS, TOTAL_SUPPLY];

/// Token metadata of every ERC-20 or ERC-721 contract. A call which reverts or
/// returns something undecodable leaves its field null.
pub(super) async fn export_tokens(cx: &JobContext<'_>, contracts: &[Record]) -> Result<Produced, ExportError> {
    let candidates: Vec<Record> = contracts
        .iter()
        .filter(|c| c.get("is_erc20") == Some(&Value::Bool(true)) || c.get("is_erc721") == Some(&Value::Bool(true)))
        .cloned()
        .collect();

    let tokens = cx
        .executor
        .execute(
            "tokens",
            candidates,
            |contracts: Vec<Record>, client: Arc<RpcClient>| async move {
                let mut batch = Vec::with_capacity(contracts.len() * METADATA_CALLS.len());
                for contract in &contracts {
                    let address = contract.get_str("address").unwrap_or_default();
                    let block_n = contract.block_number().unwrap_or_default();
                    for selector in METADATA_CALLS {
                        batch.push(requests::call(batch.len() as u64, address, selector, block_n));
                    }
                }
                let mut responses = client.batch(&batch).await?.into_iter();

                let mut tokens = Vec::with_capacity(contracts.len());
                for contract in &contracts {
                    let [symbol, name, decimals, total_supply] =
                        std::array::from_fn(|_| responses.next().and_then(call_output));
                    tokens.push(
                        Record::new(EntityType::Token)
                            .with("address", contract.get("address").cloned().unwrap_or(Value::Null))
                            .with("symbol", symbol.as_deref().and_then(decode_string))
                            .with("name", name.as_deref().and_then(decode_string))
                            .with("decimals", decimals.as_deref().and_then(decode_decimals))
                            .with("total_supply", total_supply.as_deref().and_then(decode_uint256).map(|s| s.to_string()))
                            .with("block_number", contract.get("block_number").cloned().unwrap_or(Value::Null)),
                    );
                }
                Ok::<_, RpcError>(tokens)
            },
            None,
        )
        .await?;

    Ok(Produced::single(EntityType::Token, tokens))
}

fn decode_decimals(bytes: &[u8]) -> Option<u64> {
    decode_uint256(bytes).filter(|d| d.bits() <= 8).map(|d| d.low_u64())
}

/// Raw return data of a successful call.
fn call_output(response: JsonRpcResponse) -> Option<Vec<u8>> {
    let output = response.into_option(ETH_CALL).ok()??;
    decode_hex(output.as_str()?).filter(|bytes| !bytes.is_empty())
}
