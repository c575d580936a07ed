use std::collections::HashSet;
use std::sync::Arc;

use ec_rpc::quantity::parse_decimal;
use ec_rpc::requests::{self, ETH_CALL, ETH_GET_BALANCE};
use ec_rpc::{RpcClient, RpcError};
use ep_resilience::Classify;
use ep_record::{json, EntityType, Record, Value};

use super::{error_record, JobContext, Produced};
use crate::abi::{decode_hex, decode_uint256, encode_address_call, BALANCE_OF};
use crate::join::with_block_timestamp;
use crate::ExportError;

pub(crate) const INVALID_BALANCE: &str = "invalid_balance";

const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

#[derive(Debug, Clone)]
struct Holding {
    block_number: u64,
    token_address: String,
    holder_address: String,
    token_id: Value,
    block_timestamp: Value,
}

impl Holding {
    fn record(&self, value: String) -> Record {
        Record::new(EntityType::TokenBalance)
            .with("block_number", self.block_number)
            .with("token_address", self.token_address.clone())
            .with("holder_address", self.holder_address.clone())
            .with("token_id", self.token_id.clone())
            .with("value", value)
            .with("block_timestamp", self.block_timestamp.clone())
    }

    fn error(&self, reason: Value) -> Record {
        error_record(
            INVALID_BALANCE,
            self.block_number,
            self.block_timestamp.clone(),
            json!({
                "method": ETH_CALL,
                "token_address": self.token_address,
                "holder_address": self.holder_address,
                "token_id": self.token_id,
                "reason": reason,
            }),
        )
    }
}

#[derive(Debug, Clone)]
struct Account {
    block_number: u64,
    address: String,
    block_timestamp: Value,
}

impl Account {
    fn error(&self, reason: Value) -> Record {
        error_record(
            INVALID_BALANCE,
            self.block_number,
            self.block_timestamp.clone(),
            json!({ "method": ETH_GET_BALANCE, "address": self.address, "reason": reason }),
        )
    }
}

/// Splits per-item outcomes into the produced records and the `error` records.
fn split_outcomes(outcomes: Vec<Result<Record, Record>>) -> (Vec<Record>, Vec<Record>) {
    let (records, errors): (Vec<_>, Vec<_>) = outcomes.into_iter().partition(Result::is_ok);
    (records.into_iter().flatten().collect(), errors.into_iter().filter_map(Result::err).collect())
}

/// Per-item JSON-RPC errors the node will keep returning for this request.
/// Transient codes are left to the executor retry loop.
fn item_error(err: &RpcError) -> Option<Value> {
    match err {
        RpcError::Rpc { code, message } if !err.is_transient() => Some(json!({ "code": code, "message": message })),
        _ => None,
    }
}

/// Every (block, token, holder, token id) touched by a transfer, in first
/// seen order. The zero address stands for mints and burns and is skipped.
fn holdings(transfers: &[Record]) -> Vec<Holding> {
    let mut seen = HashSet::new();
    let mut holdings = Vec::new();
    for transfer in transfers {
        let (Some(block_number), Some(token_address)) = (transfer.block_number(), transfer.get_str("token_address"))
        else {
            continue;
        };
        let token_id = transfer.get("token_id").cloned().unwrap_or(Value::Null);
        for side in ["from_address", "to_address"] {
            let Some(holder) = transfer.get_str(side).filter(|h| *h != ZERO_ADDRESS) else {
                continue;
            };
            if seen.insert((block_number, token_address.to_string(), holder.to_string(), token_id.to_string())) {
                holdings.push(Holding {
                    block_number,
                    token_address: token_address.to_string(),
                    holder_address: holder.to_string(),
                    token_id: token_id.clone(),
                    block_timestamp: transfer.get("block_timestamp").cloned().unwrap_or(Value::Null),
                });
            }
        }
    }
    holdings
}

/// `balanceOf` of every holder involved in a transfer, at the transfer block.
/// A reverted call or a malformed result becomes an `error` record, a
/// transient node error fails the batch so it is retried.
pub(super) async fn export_token_balances(
    cx: &JobContext<'_>,
    transfers: &[Record],
) -> Result<Produced, ExportError> {
    let outcomes = cx
        .executor
        .execute(
            "token_balances",
            holdings(transfers),
            |holdings: Vec<Holding>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = holdings
                    .iter()
                    .enumerate()
                    .map(|(id, h)| {
                        let data = encode_address_call(BALANCE_OF, &h.holder_address);
                        requests::call(id as u64, &h.token_address, &data, h.block_number)
                    })
                    .collect();
                let responses = client.batch(&batch).await?;

                holdings
                    .iter()
                    .zip(responses)
                    .map(|(holding, response)| match response.into_option(ETH_CALL) {
                        Ok(Some(output)) => {
                            let balance =
                                output.as_str().and_then(decode_hex).and_then(|bytes| decode_uint256(&bytes));
                            Ok(match balance {
                                Some(balance) => Ok(holding.record(balance.to_string())),
                                None => Err(holding.error(output)),
                            })
                        }
                        Ok(None) => Ok(Err(holding.error(Value::Null))),
                        Err(err) => match item_error(&err) {
                            Some(reason) => Ok(Err(holding.error(reason))),
                            None => Err(err),
                        },
                    })
                    .collect::<Result<Vec<_>, RpcError>>()
            },
            None,
        )
        .await?;

    let (balances, errors) = split_outcomes(outcomes);
    Ok(Produced { collections: vec![(EntityType::TokenBalance, balances)], errors })
}

/// Ether balance of every transaction sender and recipient, at the
/// transaction block. A null or malformed balance becomes an `error` record.
pub(super) async fn export_native_balances(
    cx: &JobContext<'_>,
    transactions: &[Record],
    blocks: &[Record],
) -> Result<Produced, ExportError> {
    let mut seen = HashSet::new();
    let mut accounts = Vec::new();
    for tx in transactions {
        let Some(block_number) = tx.block_number() else { continue };
        for address in ["from_address", "to_address"].into_iter().filter_map(|side| tx.get_str(side)) {
            if seen.insert((block_number, address.to_string())) {
                accounts.push(Account {
                    block_number,
                    address: address.to_string(),
                    block_timestamp: tx.get("block_timestamp").cloned().unwrap_or(Value::Null),
                });
            }
        }
    }

    let outcomes = cx
        .executor
        .execute(
            "native_balances",
            accounts,
            |accounts: Vec<Account>, client: Arc<RpcClient>| async move {
                let batch: Vec<_> = accounts
                    .iter()
                    .enumerate()
                    .map(|(id, account)| requests::get_balance(id as u64, &account.address, account.block_number))
                    .collect();
                let responses = client.batch(&batch).await?;

                accounts
                    .iter()
                    .zip(responses)
                    .map(|(account, response)| match response.into_option(ETH_GET_BALANCE) {
                        Ok(Some(balance)) => Ok(match parse_decimal(&balance) {
                            Ok(value) => Ok(Record::new(EntityType::NativeBalance)
                                .with("block_number", account.block_number)
                                .with("address", account.address.clone())
                                .with("value", value)),
                            Err(_) => Err(account.error(balance)),
                        }),
                        Ok(None) => Ok(Err(account.error(Value::Null))),
                        Err(err) => match item_error(&err) {
                            Some(reason) => Ok(Err(account.error(reason))),
                            None => Err(err),
                        },
                    })
                    .collect::<Result<Vec<_>, RpcError>>()
            },
            None,
        )
        .await?;

    let (balances, errors) = split_outcomes(outcomes);
    let balances = with_block_timestamp("native_balance_block", &balances, blocks)?;
    Ok(Produced { collections: vec![(EntityType::NativeBalance, balances)], errors })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer(block: u64, from: &str, to: &str) -> Record {
        Record::new(EntityType::TokenTransfer)
            .with("block_number", block)
            .with("token_address", "0xtoken")
            .with("from_address", from)
            .with("to_address", to)
            .with("token_id", Value::Null)
    }

    #[test]
    fn holdings_are_deduplicated_and_skip_zero_address() {
        let transfers = vec![transfer(1, ZERO_ADDRESS, "0xa"), transfer(1, "0xa", "0xb"), transfer(2, "0xa", "0xb")];
        let keys: Vec<_> = holdings(&transfers).into_iter().map(|h| (h.block_number, h.holder_address)).collect();
        assert_eq!(
            keys,
            vec![(1, "0xa".to_string()), (1, "0xb".to_string()), (2, "0xa".to_string()), (2, "0xb".to_string())]
        );
    }
}
