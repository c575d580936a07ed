//! Hex quantity helpers.
//!
//! Nodes encode integers as `0x` prefixed hex strings. Values which always fit
//! in 64 bits (block numbers, indices, gas) are decoded to [u64]; values which
//! may not (wei amounts, token balances) are decoded to decimal strings.
use primitive_types::U256;
use serde_json::Value;

use crate::RpcError;

pub fn to_quantity(n: u64) -> String {
    format!("{n:#x}")
}

fn as_hex_str(value: &Value) -> Result<&str, RpcError> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")))
        .ok_or_else(|| RpcError::InvalidQuantity(value.to_string()))
}

pub fn parse_u64(value: &Value) -> Result<u64, RpcError> {
    if let Some(n) = value.as_u64() {
        return Ok(n);
    }
    let hex = as_hex_str(value)?;
    if hex.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(hex, 16).map_err(|_| RpcError::InvalidQuantity(value.to_string()))
}

pub fn parse_u256(value: &Value) -> Result<U256, RpcError> {
    if let Some(n) = value.as_u64() {
        return Ok(U256::from(n));
    }
    let hex = as_hex_str(value)?;
    if hex.is_empty() {
        return Ok(U256::zero());
    }
    U256::from_str_radix(hex, 16).map_err(|_| RpcError::InvalidQuantity(value.to_string()))
}

/// Decimal string of a hex quantity of up to 256 bits.
pub fn parse_decimal(value: &Value) -> Result<String, RpcError> {
    parse_u256(value).map(|n| n.to_string())
}

/// Optional variants, mapping an absent or null field to [Value::Null].
pub fn u64_field(value: Option<&Value>) -> Result<Value, RpcError> {
    match value {
        None | Some(Value::Null) => Ok(Value::Null),
        Some(v) => parse_u64(v).map(Value::from),
    }
}

pub fn decimal_field(value: Option<&Value>) -> Result<Value, RpcError> {
    match value {
        None | Some(Value::Null) => Ok(Value::Null),
        Some(v) => parse_decimal(v).map(Value::from),
    }
}
