//! Lenient accessors over host JSON values.
//!
//! Node clients serialize integers as JSON numbers, decimal strings or hex
//! strings depending on width and client version; all three are accepted.

use alloy_primitives::U256;
use serde_json::Value;

use crate::error::SieveError;

/// Parse an unsigned integer of up to 256 bits. JSON numbers are only
/// exact up to `u64`; wider values must come as decimal or hex strings.
pub fn to_u256(value: &Value, what: &str) -> Result<U256, SieveError> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| SieveError::raw_input(format!("{what}: {n} is not an unsigned integer"))),
        Value::String(s) => parse_u256_str(s)
            .ok_or_else(|| SieveError::raw_input(format!("{what}: '{s}' is not an unsigned integer"))),
        Value::Null => Ok(U256::ZERO),
        other => Err(SieveError::raw_input(format!("{what}: unexpected {other}"))),
    }
}

fn parse_u256_str(s: &str) -> Option<U256> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        if hex.is_empty() {
            return Some(U256::ZERO);
        }
        U256::from_str_radix(hex, 16).ok()
    } else {
        U256::from_str_radix(s, 10).ok()
    }
}

pub fn to_u64(value: &Value, what: &str) -> Result<u64, SieveError> {
    let wide = to_u256(value, what)?;
    u64::try_from(wide).map_err(|_| SieveError::raw_input(format!("{what}: {wide} does not fit in u64")))
}

/// Signed chain id; `-1` is reserved for "unknown".
pub fn to_i64(value: &Value, what: &str) -> Result<i64, SieveError> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| SieveError::raw_input(format!("{what}: {n} is not an integer"))),
        _ => {
            let v = to_u64(value, what)?;
            i64::try_from(v).map_err(|_| SieveError::raw_input(format!("{what}: {v} does not fit in i64")))
        }
    }
}

/// A string field, or an error naming `what`.
pub fn to_str<'a>(value: &'a Value, what: &str) -> Result<&'a str, SieveError> {
    value
        .as_str()
        .ok_or_else(|| SieveError::raw_input(format!("{what}: expected a string, got {value}")))
}

/// Positional argument `index` of an event or call.
pub fn arg<'a>(args: &'a [Value], index: usize, what: &str) -> Result<&'a Value, SieveError> {
    args.get(index)
        .ok_or_else(|| SieveError::raw_input(format!("{what}: missing argument {index}")))
}

/// Field lookup accepting both camelCase and snake_case spellings.
pub fn field<'a>(obj: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|n| obj.get(*n)).filter(|v| !v.is_null())
}

/// `true` for an absent account or one made of zero bytes only.
pub fn is_empty_account(value: Option<&str>) -> bool {
    match value {
        None => true,
        Some(s) => {
            let body = s.strip_prefix("0x").unwrap_or(s);
            body.is_empty() || body.chars().all(|c| c == '0')
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn integers_from_every_encoding() {
        assert_eq!(to_u256(&json!(21000), "gas").unwrap(), U256::from(21000u64));
        assert_eq!(to_u256(&json!("21000"), "gas").unwrap(), U256::from(21000u64));
        assert_eq!(to_u256(&json!("0x5208"), "gas").unwrap(), U256::from(21000u64));
        assert_eq!(to_u256(&json!("0x"), "gas").unwrap(), U256::ZERO);
        assert!(to_u256(&json!("twenty"), "gas").is_err());
        assert!(to_u256(&json!(-1), "gas").is_err());
    }

    #[test]
    fn integers_beyond_u64() {
        let big = U256::from(u64::MAX) + U256::from(1u64);
        assert_eq!(to_u256(&json!("18446744073709551616"), "value").unwrap(), big);
        assert_eq!(to_u256(&json!("0x10000000000000000"), "value").unwrap(), big);
        assert_eq!(
            to_u256(&json!("0xffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff"), "value").unwrap(),
            U256::MAX
        );
        // one past U256::MAX
        assert!(to_u256(
            &json!("115792089237316195423570985008687907853269984665640564039457584007913129639936"),
            "value"
        )
        .is_err());
        // JSON numbers past u64 arrive as floats and must be sent as strings
        assert!(to_u256(&json!(1.8446744073709552e19), "value").is_err());
    }

    #[test]
    fn chain_id_signed() {
        assert_eq!(to_i64(&json!(1284), "chainId").unwrap(), 1284);
        assert_eq!(to_i64(&json!("0x504"), "chainId").unwrap(), 1284);
    }

    #[test]
    fn empty_accounts() {
        assert!(is_empty_account(None));
        assert!(is_empty_account(Some("0x0000000000000000000000000000000000000000")));
        assert!(!is_empty_account(Some("0x0000000000000000000000000000000000000001")));
    }

    #[test]
    fn field_accepts_either_spelling() {
        let v = json!({"gas_limit": 5});
        assert_eq!(field(&v, &["gasLimit", "gas_limit"]), Some(&json!(5)));
        assert_eq!(field(&json!({"gasLimit": null}), &["gasLimit"]), None);
    }
}
