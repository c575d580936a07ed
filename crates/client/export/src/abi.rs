//! Minimal ABI handling for the calls and events the jobs care about.
use primitive_types::U256;

pub const TRANSFER_EVENT_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";

pub const SYMBOL: &str = "0x95d89b41";
pub const NAME: &str = "0x06fdde03";
pub const DECIMALS: &str = "0x313ce567";
pub const TOTAL_SUPPLY: &str = "0x18160ddd";
pub const BALANCE_OF: &str = "0x70a08231";

const ERC20_SIGHASHES: [&str; 6] =
    ["0x18160ddd", "0x70a08231", "0xa9059cbb", "0x23b872dd", "0x095ea7b3", "0xdd62ed3e"];
const ERC721_SIGHASHES: [&str; 8] =
    ["0x70a08231", "0x6352211e", "0x23b872dd", "0x42842e0e", "0x095ea7b3", "0xa22cb465", "0x081812fc", "0xe985e9c5"];

const PUSH1: u8 = 0x60;
const PUSH4: u8 = 0x63;
const PUSH32: u8 = 0x7f;

pub fn decode_hex(data: &str) -> Option<Vec<u8>> {
    let data = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(data).ok()
}

/// `0x` prefixed address held in the low 20 bytes of a 32 byte word.
pub fn word_to_address(word: &str) -> Option<String> {
    let bytes = decode_hex(word)?;
    if bytes.len() != 32 {
        return None;
    }
    Some(format!("0x{}", hex::encode(&bytes[12..])))
}

pub fn decode_uint256(bytes: &[u8]) -> Option<U256> {
    (bytes.len() == 32).then(|| U256::from_big_endian(bytes))
}

fn word_to_usize(word: &[u8]) -> Option<usize> {
    let value = decode_uint256(word)?;
    (value <= U256::from(u32::MAX)).then(|| value.low_u64() as usize)
}

/// ABI `string` return value, falling back to a right padded `bytes32` as
/// returned by some early tokens.
pub fn decode_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() == 32 {
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(32);
        return String::from_utf8(bytes[..end].to_vec()).ok();
    }
    let offset = word_to_usize(bytes.get(..32)?)?;
    let len = word_to_usize(bytes.get(offset..offset.checked_add(32)?)?)?;
    let start = offset + 32;
    let raw = bytes.get(start..start.checked_add(len)?)?;
    let s = String::from_utf8(raw.to_vec()).ok()?;
    Some(s.trim_end_matches('\0').to_string())
}

/// Calldata for a call taking a single address argument.
pub fn encode_address_call(selector: &str, address: &str) -> String {
    let address = address.strip_prefix("0x").unwrap_or(address);
    format!("{selector}{address:0>64}")
}

/// Function selectors found as `PUSH4` operands in runtime bytecode, sorted
/// and deduplicated.
pub fn function_sighashes(bytecode: &[u8]) -> Vec<String> {
    let mut sighashes = Vec::new();
    let mut pc = 0;
    while pc < bytecode.len() {
        let op = bytecode[pc];
        if (PUSH1..=PUSH32).contains(&op) {
            let size = usize::from(op - PUSH1) + 1;
            if op == PUSH4 {
                if let Some(operand) = bytecode.get(pc + 1..pc + 5) {
                    sighashes.push(format!("0x{}", hex::encode(operand)));
                }
            }
            pc += size;
        }
        pc += 1;
    }
    sighashes.sort();
    sighashes.dedup();
    sighashes
}

fn implements(sighashes: &[String], required: &[&str]) -> bool {
    required.iter().all(|s| sighashes.iter().any(|h| h == s))
}

pub fn is_erc20(sighashes: &[String]) -> bool {
    implements(sighashes, &ERC20_SIGHASHES)
}

pub fn is_erc721(sighashes: &[String]) -> bool {
    implements(sighashes, &ERC721_SIGHASHES)
}
