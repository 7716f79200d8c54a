//! Event-signature → topic and function-signature → selector derivation.
//!
//! Both accept either a raw hex token (passed through) or a human-readable
//! Solidity signature such as `Transfer(address indexed from, address to,
//! uint256 value)`. Parameter names and `indexed` are dropped before the
//! canonical signature is keccak256-hashed.

use alloy_json_abi::{Event, Function};

use crate::error::SieveError;
use crate::hexutil::{encode_hex, is_hex_string, keccak256};

/// Resolve a topic filter token to a topic hash.
///
/// Any `0x` hex token is returned unchanged; it is compared
/// case-insensitively later, so a shorter hex value (e.g. an address) simply
/// never matches a 32-byte topic.
pub fn event_signature_to_topic(token: &str) -> Result<String, SieveError> {
    if is_hex_string(token) {
        return Ok(token.to_string());
    }

    let event = Event::parse(token.trim()).map_err(|e| SieveError::InvalidTopicFilter {
        token: token.to_string(),
        reason: e.to_string(),
    })?;

    Ok(encode_hex(&keccak256(event.signature().as_bytes())))
}

/// Resolve a function token to its 4-byte selector (`0x` + 8 hex chars).
pub fn function_signature_to_selector(token: &str) -> Result<String, SieveError> {
    if is_hex_string(token) {
        if token.len() < 10 {
            return Err(SieveError::InvalidSelectorToken {
                token: token.to_string(),
                reason: "hex selector must be at least 4 bytes".into(),
            });
        }
        return Ok(token[..10].to_ascii_lowercase());
    }

    let function = Function::parse(token.trim()).map_err(|e| SieveError::InvalidSelectorToken {
        token: token.to_string(),
        reason: e.to_string(),
    })?;

    let hash = keccak256(function.signature().as_bytes());
    Ok(encode_hex(&hash[..4]))
}
