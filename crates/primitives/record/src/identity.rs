//! Deterministic item identity and canonical timestamp of a record.
use chrono::DateTime;
use serde_json::Value;
use sha3::{Digest, Keccak256};

use crate::{EntityType, Record};

pub const ITEM_ID: &str = "item_id";
pub const ITEM_TIMESTAMP: &str = "item_timestamp";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn segment(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Keccak-256 of the key-sorted JSON encoding of `value`.
fn content_digest(value: &Value) -> String {
    // serde_json maps are ordered by key, so the encoding is canonical.
    let encoded = value.to_string();
    hex::encode(Keccak256::digest(encoded.as_bytes()))
}

/// `<type>_<field>_<field>...` built from the identity fields of the type.
///
/// Returns [None] and logs a warning when one of those fields is absent. A
/// field explicitly set to null yields an empty segment, distinct from `0`.
/// `error` records are identified by their kind, block and a digest of their
/// `data` payload, so the same failure observed twice gets the same identity.
pub fn item_id(record: &Record) -> Option<String> {
    let mut parts = Vec::with_capacity(5);
    parts.push(record.kind.as_str().to_string());

    for field in record.kind.identity_fields() {
        match record.get(field) {
            Some(value) => parts.push(segment(value)),
            None => {
                tracing::warn!(kind = %record.kind, field, "Record is missing an identity field");
                return None;
            }
        }
    }

    if record.kind == EntityType::Error {
        parts.push(content_digest(record.get("data").unwrap_or(&Value::Null)));
    }

    Some(parts.join("_"))
}

fn parse_unix_seconds(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => match s.strip_prefix("0x") {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => s.parse().ok(),
        },
        _ => None,
    }
}

/// ISO-8601 UTC timestamp of the record: `timestamp`, else `block_timestamp`.
///
/// Timeless types always yield [None] silently. Other records without a
/// usable timestamp yield [None] with a warning.
pub fn item_timestamp(record: &Record) -> Option<String> {
    if record.kind.is_timeless() {
        return None;
    }

    let raw = ["timestamp", "block_timestamp"].into_iter().filter_map(|f| record.get(f)).find(|v| !v.is_null());

    let formatted = raw
        .and_then(parse_unix_seconds)
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .map(|dt| dt.format(TIMESTAMP_FORMAT).to_string());

    if formatted.is_none() {
        tracing::warn!(kind = %record.kind, "Record has no usable timestamp");
    }
    formatted
}

/// Adds `item_id` and `item_timestamp` to the record, as null when unknown.
pub fn assign(record: &mut Record) {
    let id = item_id(record);
    let timestamp = item_timestamp(record);
    record.insert(ITEM_ID, id.map(Value::String).unwrap_or(Value::Null));
    record.insert(ITEM_TIMESTAMP, timestamp.map(Value::String).unwrap_or(Value::Null));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn block_identity_uses_hash() {
        let block = Record::new(EntityType::Block).with("hash", "0xabc").with("number", 1);
        assert_eq!(item_id(&block).as_deref(), Some("block_0xabc"));
    }

    #[test]
    fn log_identity_joins_fields_in_order() {
        let log = Record::new(EntityType::Log).with("transaction_hash", "0xt").with("log_index", 4);
        assert_eq!(item_id(&log).as_deref(), Some("log_0xt_4"));
    }

    #[test]
    fn token_balance_null_token_id_renders_empty() {
        let balance = Record::new(EntityType::TokenBalance)
            .with("block_number", 10)
            .with("token_address", "0xtoken")
            .with("holder_address", "0xholder")
            .with("token_id", Value::Null);
        assert_eq!(item_id(&balance).as_deref(), Some("token_balance_10_0xtoken_0xholder_"));
    }

    #[test]
    fn null_and_zero_token_id_are_distinct() {
        let balance = |token_id: Value| {
            Record::new(EntityType::TokenBalance)
                .with("block_number", 10)
                .with("token_address", "0xtoken")
                .with("holder_address", "0xholder")
                .with("token_id", token_id)
        };
        assert_ne!(item_id(&balance(Value::Null)), item_id(&balance(Value::from(0))));
        assert_eq!(item_id(&balance(Value::from(0))).as_deref(), Some("token_balance_10_0xtoken_0xholder_0"));
    }

    #[test]
    fn missing_identity_field_yields_none() {
        let log = Record::new(EntityType::Log).with("transaction_hash", "0xt");
        assert_eq!(item_id(&log), None);
    }

    #[test]
    fn error_identity_is_deterministic() {
        let make = || {
            Record::new(EntityType::Error)
                .with("kind", "missing_receipt")
                .with("block_number", 7)
                .with("data", json!({ "transaction_hash": "0x1", "response": null }))
        };
        let first = item_id(&make()).unwrap();
        assert_eq!(Some(first.clone()), item_id(&make()));
        assert!(first.starts_with("error_missing_receipt_7_"));

        let other = make().with("data", json!({ "transaction_hash": "0x2", "response": null }));
        assert_ne!(Some(first), item_id(&other));
    }

    #[rstest]
    #[case(json!(1_700_000_000), "2023-11-14T22:13:20Z")]
    #[case(json!("0x6553f100"), "2023-11-14T22:13:20Z")]
    #[case(json!("1700000000"), "2023-11-14T22:13:20Z")]
    fn timestamp_parses_numeric_forms(#[case] raw: Value, #[case] expected: &str) {
        let block = Record::new(EntityType::Block).with("timestamp", raw);
        assert_eq!(item_timestamp(&block).as_deref(), Some(expected));
    }

    #[test]
    fn timestamp_prefers_timestamp_over_block_timestamp() {
        let record = Record::new(EntityType::Block).with("timestamp", 0).with("block_timestamp", 1_700_000_000);
        assert_eq!(item_timestamp(&record).as_deref(), Some("1970-01-01T00:00:00Z"));

        let tx = Record::new(EntityType::Transaction).with("block_timestamp", 1_700_000_000);
        assert_eq!(item_timestamp(&tx).as_deref(), Some("2023-11-14T22:13:20Z"));
    }

    #[test]
    fn timeless_and_missing_timestamps() {
        let token = Record::new(EntityType::Token).with("timestamp", 1);
        assert_eq!(item_timestamp(&token), None);

        let log = Record::new(EntityType::Log);
        assert_eq!(item_timestamp(&log), None);
    }

    #[test]
    fn assign_sets_both_fields() {
        let mut log = Record::new(EntityType::Log).with("transaction_hash", "0xt");
        assign(&mut log);
        assert_eq!(log.get(ITEM_ID), Some(&Value::Null));
        assert_eq!(log.get(ITEM_TIMESTAMP), Some(&Value::Null));

        let mut block = Record::new(EntityType::Block).with("hash", "0xb").with("timestamp", 0);
        assign(&mut block);
        assert_eq!(block.get_str(ITEM_ID), Some("block_0xb"));
        assert_eq!(block.get_str(ITEM_TIMESTAMP), Some("1970-01-01T00:00:00Z"));
    }
}
