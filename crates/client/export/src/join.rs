//! Equality join over record collections.
//!
//! Used to attach fields of an already extracted collection (typically the
//! block timestamp) onto another one without changing its cardinality.
use std::collections::HashMap;

use ep_record::{Fields, Record, Value};

use crate::ExportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub from: &'static str,
    pub to: &'static str,
}

impl FieldMapping {
    pub const fn same(name: &'static str) -> Self {
        Self { from: name, to: name }
    }

    pub const fn renamed(from: &'static str, to: &'static str) -> Self {
        Self { from, to }
    }
}

/// Which fields of one side end up in the joined record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Fields(Vec<FieldMapping>),
}

impl Projection {
    pub fn renamed(mappings: &[(&'static str, &'static str)]) -> Self {
        Self::Fields(mappings.iter().map(|(from, to)| FieldMapping::renamed(from, to)).collect())
    }

    fn apply(&self, record: &Record, into: &mut Fields) {
        match self {
            Projection::All => into.extend(record.fields.iter().map(|(k, v)| (k.clone(), v.clone()))),
            Projection::Fields(mappings) => {
                for FieldMapping { from, to } in mappings {
                    into.insert(to.to_string(), record.get(from).cloned().unwrap_or(Value::Null));
                }
            }
        }
    }
}

fn join_key(record: &Record, field: &str) -> Option<String> {
    match record.get(field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(value.to_string()),
    }
}

/// Inner equality join of `left` against `right`.
///
/// `right` is indexed by `keys.1`, duplicates grouped. Every `left` record
/// whose `keys.0` matches a group yields one record per group member, built
/// from the projected left fields followed by the projected right fields, and
/// tagged with the left record's type. Absent and null keys never match.
/// Output follows the order of `left`.
pub fn join<'a>(
    left: &'a [Record],
    right: &'a [Record],
    keys: (&'a str, &'a str),
    left_fields: &'a Projection,
    right_fields: &'a Projection,
) -> impl Iterator<Item = Record> + 'a {
    let (left_key, right_key) = keys;
    let mut index: HashMap<String, Vec<&'a Record>> = HashMap::new();
    for record in right {
        if let Some(key) = join_key(record, right_key) {
            index.entry(key).or_default().push(record);
        }
    }

    left.iter().flat_map(move |l| {
        let group = join_key(l, left_key).and_then(|key| index.get(&key).cloned()).unwrap_or_default();
        group.into_iter().map(move |r| {
            let mut fields = Fields::new();
            left_fields.apply(l, &mut fields);
            right_fields.apply(r, &mut fields);
            Record::from_fields(l.kind, fields)
        })
    })
}

/// [join] for a relation where `right` must cover every `left` record exactly
/// once. Any other outcome means upstream extraction is incomplete.
pub fn join_checked(
    relation: &'static str,
    left: &[Record],
    right: &[Record],
    keys: (&str, &str),
    left_fields: &Projection,
    right_fields: &Projection,
) -> Result<Vec<Record>, ExportError> {
    let joined: Vec<Record> = join(left, right, keys, left_fields, right_fields).collect();
    if joined.len() != left.len() {
        return Err(ExportError::CardinalityMismatch { relation, expected: left.len(), actual: joined.len() });
    }
    Ok(joined)
}

/// Adds `block_timestamp` to every record from its block.
pub fn with_block_timestamp(
    relation: &'static str,
    records: &[Record],
    blocks: &[Record],
) -> Result<Vec<Record>, ExportError> {
    join_checked(
        relation,
        records,
        blocks,
        ("block_number", "number"),
        &Projection::All,
        &Projection::renamed(&[("timestamp", "block_timestamp")]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use ep_record::{json, EntityType};

    fn block(number: u64, timestamp: u64) -> Record {
        Record::new(EntityType::Block).with("number", number).with("timestamp", timestamp).with("hash", format!("0x{number}"))
    }

    fn log(block_number: u64, log_index: u64) -> Record {
        Record::new(EntityType::Log).with("block_number", block_number).with("log_index", log_index)
    }

    #[test]
    fn one_to_one_join_preserves_cardinality_and_order() {
        let blocks = vec![block(2, 200), block(1, 100)];
        let logs = vec![log(1, 0), log(2, 0), log(1, 1)];

        let joined = with_block_timestamp("log_block", &logs, &blocks).unwrap();

        assert_eq!(joined.len(), logs.len());
        let stamps: Vec<_> = joined.iter().map(|r| r.get("block_timestamp").cloned()).collect();
        assert_eq!(stamps, vec![Some(json!(100)), Some(json!(200)), Some(json!(100))]);
        assert!(joined.iter().all(|r| r.kind == EntityType::Log));
        assert_eq!(joined[2].get("log_index"), Some(&json!(1)));
    }

    #[test]
    fn duplicate_right_keys_yield_cross_product() {
        let left = vec![log(1, 0), log(2, 0)];
        let right = vec![block(1, 100), block(1, 101), block(2, 200)];

        let joined: Vec<_> =
            join(&left, &right, ("block_number", "number"), &Projection::All, &Projection::All).collect();
        assert_eq!(joined.len(), 3);
    }

    #[test]
    fn projection_renames_and_fills_nulls() {
        let left = vec![log(1, 0)];
        let right = vec![block(1, 100)];
        let left_fields = Projection::Fields(vec![FieldMapping::same("log_index")]);
        let right_fields = Projection::renamed(&[("hash", "block_hash"), ("miner", "block_miner")]);

        let joined: Vec<_> = join(&left, &right, ("block_number", "number"), &left_fields, &right_fields).collect();
        assert_eq!(joined[0].fields.len(), 3);
        assert_eq!(joined[0].get("block_hash"), Some(&json!("0x1")));
        assert_eq!(joined[0].get("block_miner"), Some(&Value::Null));
    }

    #[test]
    fn null_keys_never_match() {
        let left = vec![Record::new(EntityType::Log).with("block_number", Value::Null)];
        let right = vec![Record::new(EntityType::Block).with("number", Value::Null)];
        let joined: Vec<_> =
            join(&left, &right, ("block_number", "number"), &Projection::All, &Projection::All).collect();
        assert!(joined.is_empty());
    }

    #[test]
    fn incomplete_coverage_is_a_cardinality_mismatch() {
        let logs = vec![log(1, 0), log(3, 0)];
        let blocks = vec![block(1, 100)];
        assert_matches!(
            with_block_timestamp("log_block", &logs, &blocks),
            Err(ExportError::CardinalityMismatch { relation: "log_block", expected: 2, actual: 1 })
        );
    }
}
