//! WASM contract records and filters.

use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use chainsieve_core::error::SieveError;
use chainsieve_core::filter::{FieldRule, FilterShape};
use chainsieve_core::raw::value::{field, to_u64};
use chainsieve_core::types::DecodedArgs;

/// A `contracts.ContractEmitted` event in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmEvent {
    /// Extrinsic signer, or the empty address outside an extrinsic
    pub from: String,
    pub contract: String,
    /// First byte of the event payload
    pub event_index: u8,
    /// Event label, when the metadata decodes the payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<DecodedArgs>,
    pub transaction_hash: Option<String>,
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
}

/// Call weight. Plain numbers before weights v2, `{refTime, proofSize}`
/// after.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weight {
    pub ref_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proof_size: Option<u64>,
}

impl Weight {
    pub fn from_value(value: &Value) -> Result<Self, SieveError> {
        match value {
            Value::Object(_) => {
                let ref_time = field(value, &["refTime", "ref_time"])
                    .ok_or_else(|| SieveError::raw_input(format!("gas_limit: missing refTime in {value}")))?;
                Ok(Self {
                    ref_time: to_u64(ref_time, "gas_limit.refTime")?,
                    proof_size: field(value, &["proofSize", "proof_size"])
                        .map(|p| to_u64(p, "gas_limit.proofSize"))
                        .transpose()?,
                })
            }
            other => Ok(Self {
                ref_time: to_u64(other, "gas_limit")?,
                proof_size: None,
            }),
        }
    }
}

/// Message payload of a call: decoded when the metadata knows the
/// selector, the raw hex otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WasmCallData {
    Decoded { message: String, args: DecodedArgs },
    Raw(String),
}

impl WasmCallData {
    pub fn is_decoded(&self) -> bool {
        matches!(self, WasmCallData::Decoded { .. })
    }

    pub fn args(&self) -> Option<&DecodedArgs> {
        match self {
            WasmCallData::Decoded { args, .. } => Some(args),
            WasmCallData::Raw(_) => None,
        }
    }
}

/// A `contracts.call` extrinsic in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WasmCall {
    pub from: String,
    pub dest: String,
    pub value: U256,
    pub gas_limit: Weight,
    pub storage_deposit_limit: Option<U256>,
    pub data: WasmCallData,
    /// First four bytes of the message payload; present even when the
    /// payload cannot be decoded
    pub selector: String,
    pub success: bool,
    pub hash: String,
    pub block_number: u64,
    pub block_hash: String,
    pub timestamp: DateTime<Utc>,
}

// ─── Filters ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmEventFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Event label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WasmCallFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Message label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

pub const WASM_EVENT_FILTER_SHAPE: FilterShape = FilterShape {
    kind: "WASM event",
    fields: &[
        ("from", FieldRule::Text),
        ("contract", FieldRule::Text),
        ("identifier", FieldRule::NullableText),
    ],
    exclusive: &[],
};

pub const WASM_CALL_FILTER_SHAPE: FilterShape = FilterShape {
    kind: "WASM call",
    fields: &[
        ("from", FieldRule::Text),
        ("selector", FieldRule::HexSelector),
        ("method", FieldRule::Text),
    ],
    exclusive: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn weight_both_generations() {
        assert_eq!(
            Weight::from_value(&json!(200_000_000_000u64)).unwrap(),
            Weight { ref_time: 200_000_000_000, proof_size: None }
        );
        assert_eq!(
            Weight::from_value(&json!({"refTime": "0x2540be400", "proofSize": 131072})).unwrap(),
            Weight { ref_time: 10_000_000_000, proof_size: Some(131_072) }
        );
        assert!(Weight::from_value(&json!({"proofSize": 1})).is_err());
    }

    #[test]
    fn call_filter_shape() {
        assert!(WASM_CALL_FILTER_SHAPE.check(&json!({"selector": "0x633aa551", "method": "flip"})).is_ok());
        assert!(WASM_CALL_FILTER_SHAPE.check(&json!({"selector": "flip"})).is_err());
        assert!(WASM_CALL_FILTER_SHAPE.check(&json!({"dest": "5F"})).is_err());
        assert!(WASM_EVENT_FILTER_SHAPE.check(&json!({"identifier": null, "contract": "5F"})).is_ok());
        assert!(WASM_EVENT_FILTER_SHAPE.check(&json!({"identifier": 3})).is_err());
    }

    #[test]
    fn call_data_serializes_either_way() {
        assert_eq!(serde_json::to_value(WasmCallData::Raw("0x00".into())).unwrap(), json!("0x00"));
        let decoded = WasmCallData::Decoded {
            message: "flip".into(),
            args: DecodedArgs::default(),
        };
        assert_eq!(serde_json::to_value(&decoded).unwrap(), json!({"message": "flip", "args": []}));
        assert!(decoded.is_decoded());
    }
}
