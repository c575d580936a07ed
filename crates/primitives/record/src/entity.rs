use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Discriminator of every record produced by the pipeline.
///
/// The declaration order is the order in which collections are concatenated
/// before being handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Block,
    Transaction,
    Receipt,
    Log,
    TokenTransfer,
    Trace,
    GethTrace,
    Contract,
    Token,
    InternalTransfer,
    TokenBalance,
    NativeBalance,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown entity type: {0:?}")]
pub struct UnknownEntityType(pub String);

impl EntityType {
    /// Every entity type, in export order.
    pub const ALL: [EntityType; 13] = [
        EntityType::Block,
        EntityType::Transaction,
        EntityType::Receipt,
        EntityType::Log,
        EntityType::TokenTransfer,
        EntityType::Trace,
        EntityType::GethTrace,
        EntityType::Contract,
        EntityType::Token,
        EntityType::InternalTransfer,
        EntityType::TokenBalance,
        EntityType::NativeBalance,
        EntityType::Error,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Block => "block",
            EntityType::Transaction => "transaction",
            EntityType::Receipt => "receipt",
            EntityType::Log => "log",
            EntityType::TokenTransfer => "token_transfer",
            EntityType::Trace => "trace",
            EntityType::GethTrace => "geth_trace",
            EntityType::Contract => "contract",
            EntityType::Token => "token",
            EntityType::InternalTransfer => "internal_transfer",
            EntityType::TokenBalance => "token_balance",
            EntityType::NativeBalance => "native_balance",
            EntityType::Error => "error",
        }
    }

    /// Fields which, together with the type, identify a record.
    ///
    /// `error` is handled separately, see [crate::identity::item_id].
    pub fn identity_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::Block => &["hash"],
            EntityType::Transaction => &["hash"],
            EntityType::Receipt => &["transaction_hash"],
            EntityType::Log | EntityType::TokenTransfer => &["transaction_hash", "log_index"],
            EntityType::Trace | EntityType::InternalTransfer => &["trace_id"],
            EntityType::GethTrace => &["transaction_hash"],
            EntityType::Contract | EntityType::Token => &["block_number", "address"],
            EntityType::TokenBalance => &["block_number", "token_address", "holder_address", "token_id"],
            EntityType::NativeBalance => &["block_number", "address"],
            EntityType::Error => &["kind", "block_number"],
        }
    }

    /// Fields a collection of this type is sorted by before export.
    pub fn sort_fields(&self) -> &'static [&'static str] {
        match self {
            EntityType::Block => &["number"],
            EntityType::Transaction | EntityType::Receipt | EntityType::GethTrace => {
                &["block_number", "transaction_index"]
            }
            EntityType::Log | EntityType::TokenTransfer => &["block_number", "log_index"],
            EntityType::Trace | EntityType::InternalTransfer => &["block_number", "trace_index"],
            EntityType::Contract | EntityType::Token | EntityType::Error => &["block_number"],
            EntityType::TokenBalance => &["block_number", "token_address", "holder_address"],
            EntityType::NativeBalance => &["block_number", "address"],
        }
    }

    /// Types whose time is implied by their owning block and never carry a
    /// timestamp of their own.
    pub fn is_timeless(&self) -> bool {
        matches!(self, EntityType::Contract | EntityType::Token)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = UnknownEntityType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL.into_iter().find(|t| t.as_str().eq_ignore_ascii_case(s)).ok_or_else(|| UnknownEntityType(s.to_string()))
    }
}
