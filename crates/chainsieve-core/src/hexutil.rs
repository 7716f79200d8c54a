//! Hex string helpers shared by every flavor.

use tiny_keccak::{Hasher, Keccak};

use crate::error::SieveError;

/// 32 zero bytes, used when a log carries no data.
pub const HASH_ZERO: &str = "0x0000000000000000000000000000000000000000000000000000000000000000";

/// Sender used when an event has no owning extrinsic.
pub const EMPTY_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Transaction hash used for Acala logs emitted outside an extrinsic.
pub const DUMMY_TX_HASH: &str =
    "0x6666666666666666666666666666666666666666666666666666666666666666";

/// Case-insensitive hex equality. An absent operand never equals anything,
/// including another absent operand.
pub fn hex_equals(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// `true` if `s` is `0x` followed only by hex digits.
pub fn is_hex_string(s: &str) -> bool {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(body) => body.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// `true` if `s` is a hex string encoding exactly `len` bytes.
pub fn is_hex_of_len(s: &str, len: usize) -> bool {
    is_hex_string(s) && s.len() == 2 + len * 2
}

/// `true` if `s` looks like a 20-byte EVM address.
pub fn is_evm_address(s: &str) -> bool {
    is_hex_of_len(s, 20)
}

pub fn keccak256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(bytes);
    hasher.finalize(&mut output);
    output
}

/// Decode a `0x`-prefixed (or bare) hex string.
pub fn decode_hex(s: &str) -> Result<Vec<u8>, SieveError> {
    let body = s.strip_prefix("0x").unwrap_or(s);
    hex::decode(body).map_err(|e| SieveError::raw_input(format!("invalid hex '{s}': {e}")))
}

/// Encode bytes as lower-case `0x`-prefixed hex.
pub fn encode_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_equals_ignores_case() {
        assert!(hex_equals(Some("0xABCdef"), Some("0xabcDEF")));
        assert!(!hex_equals(Some("0xab"), Some("0xac")));
    }

    #[test]
    fn absent_never_equals() {
        assert!(!hex_equals(None, Some("0x00")));
        assert!(!hex_equals(Some("0x00"), None));
        assert!(!hex_equals(None, None));
    }

    #[test]
    fn address_shape() {
        assert!(is_evm_address("0x220866B1A2219f40e72f5c628B65D54268cA3A9D"));
        assert!(!is_evm_address("0x220866B1A2219f40e72f5c628B65D54268cA3A9"));
        assert!(!is_evm_address("220866B1A2219f40e72f5c628B65D54268cA3A9D00"));
        assert!(!is_hex_string("Transfer(address,address,uint256)"));
    }

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            encode_hex(&keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
