use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::EntityType;

pub type Fields = Map<String, Value>;

/// A typed, open ended mapping of field name to value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "type")]
    pub kind: EntityType,
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    pub fn new(kind: EntityType) -> Self {
        Self { kind, fields: Fields::new() }
    }

    pub fn from_fields(kind: EntityType, fields: Fields) -> Self {
        Self { kind, fields }
    }

    /// Builder style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(Value::as_u64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn block_number(&self) -> Option<u64> {
        self.get_u64("block_number").or_else(|| if self.kind == EntityType::Block { self.get_u64("number") } else { None })
    }
}
