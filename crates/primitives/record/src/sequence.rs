//! Canonical ordering of the records of one cycle.
use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use crate::{identity, EntityType, Record};

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Nulls first, numbers numerically, strings lexicographically.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_u64(), b.as_u64()) {
            (Some(a), Some(b)) => a.cmp(&b),
            _ => a.as_f64().unwrap_or(f64::NAN).total_cmp(&b.as_f64().unwrap_or(f64::NAN)),
        },
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn compare_records(fields: &[&str], a: &Record, b: &Record) -> Ordering {
    fields
        .iter()
        .map(|f| compare_values(a.get(f).unwrap_or(&Value::Null), b.get(f).unwrap_or(&Value::Null)))
        .find(|ord| ord.is_ne())
        .unwrap_or(Ordering::Equal)
}

/// Stable sort of a single type collection by its per type key.
pub fn sort_records(kind: EntityType, records: &mut [Record]) {
    let fields = kind.sort_fields();
    records.sort_by(|a, b| compare_records(fields, a, b));
}

/// Sorts each requested collection, assigns identities and timestamps, and
/// concatenates the collections in export order.
pub fn sequence(mut collections: HashMap<EntityType, Vec<Record>>, requested: &[EntityType]) -> Vec<Record> {
    let mut out = Vec::with_capacity(collections.values().map(Vec::len).sum());

    for kind in EntityType::ALL.into_iter().filter(|t| requested.contains(t)) {
        let Some(mut records) = collections.remove(&kind) else { continue };
        sort_records(kind, &mut records);
        for mut record in records {
            identity::assign(&mut record);
            out.push(record);
        }
    }

    out
}
