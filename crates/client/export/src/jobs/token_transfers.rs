use ep_record::{EntityType, Record, Value};
use primitive_types::U256;

use super::Produced;
use crate::abi::{decode_hex, decode_uint256, word_to_address, TRANSFER_EVENT_TOPIC};
use crate::join::with_block_timestamp;
use crate::ExportError;

/// ERC-20 and ERC-721 `Transfer` events found in `logs`.
///
/// ERC-20 transfers carry the amount in the data, ERC-721 transfers carry the
/// token id as a fourth indexed topic and move exactly one token.
pub(super) fn extract_token_transfers(logs: &[Record], blocks: &[Record]) -> Result<Produced, ExportError> {
    let transfers: Vec<Record> = logs.iter().filter_map(extract_transfer).collect();
    let transfers = with_block_timestamp("token_transfer_block", &transfers, blocks)?;
    Ok(Produced::single(EntityType::TokenTransfer, transfers))
}

fn extract_transfer(log: &Record) -> Option<Record> {
    let topics: Vec<&str> = log.get("topics")?.as_array()?.iter().filter_map(Value::as_str).collect();
    if topics.first().map(|t| t.to_lowercase()) != Some(TRANSFER_EVENT_TOPIC.to_string()) {
        return None;
    }

    let (value, token_id) = match topics.len() {
        3 => {
            let data = decode_hex(log.get_str("data").unwrap_or_default())?;
            match decode_uint256(&data) {
                Some(value) => (value.to_string(), Value::Null),
                None => {
                    tracing::debug!(
                        tx_hash = log.get_str("transaction_hash"),
                        log_index = log.get_u64("log_index"),
                        "Skipping transfer log with malformed data"
                    );
                    return None;
                }
            }
        }
        4 => {
            let token_id = decode_hex(topics[3]).and_then(|bytes| decode_uint256(&bytes))?;
            (U256::one().to_string(), Value::String(token_id.to_string()))
        }
        _ => return None,
    };

    Some(
        Record::new(EntityType::TokenTransfer)
            .with("token_address", log.get("address").cloned().unwrap_or(Value::Null))
            .with("from_address", word_to_address(topics[1]))
            .with("to_address", word_to_address(topics[2]))
            .with("value", value)
            .with("token_id", token_id)
            .with("transaction_hash", log.get("transaction_hash").cloned().unwrap_or(Value::Null))
            .with("log_index", log.get("log_index").cloned().unwrap_or(Value::Null))
            .with("block_number", log.get("block_number").cloned().unwrap_or(Value::Null)),
    )
}
