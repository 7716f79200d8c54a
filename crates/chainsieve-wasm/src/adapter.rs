//! `contracts` pallet extraction: `ContractEmitted` events and
//! `contracts.call` extrinsics.

use parity_scale_codec::{Compact, Decode};
use serde_json::Value;

use chainsieve_core::adapter::{ChainAdapter, ExecutionOutcome, Flavor};
use chainsieve_core::diagnostics::Diagnostics;
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::{decode_hex, encode_hex};
use chainsieve_core::raw::value::{arg, field, to_str, to_u256};
use chainsieve_core::raw::{SubstrateCall, SubstrateEvent};

use crate::types::{WasmCall, WasmCallData, Weight};

const CONTRACTS: &str = "contracts";

/// One `contracts.ContractEmitted` event before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractEmitted {
    pub contract: String,
    /// Event index byte followed by the SCALE-encoded fields
    pub payload: Vec<u8>,
}

impl ContractEmitted {
    pub fn event_index(&self) -> u8 {
        // extraction rejects empty payloads
        self.payload.first().copied().unwrap_or_default()
    }
}

/// One `contracts.call` before the message is decoded. `call.data` holds
/// the raw payload hex until a processor decodes it.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractCall {
    pub call: WasmCall,
    /// Message payload without its length prefix
    pub payload: Vec<u8>,
}

/// Strip a SCALE `Compact<u32>` length prefix, but only when it announces
/// exactly the bytes that follow. Node clients differ on whether `Bytes`
/// arguments keep the prefix.
pub fn strip_length_prefix(bytes: &[u8]) -> &[u8] {
    let mut cursor = bytes;
    match Compact::<u32>::decode(&mut cursor) {
        Ok(Compact(len)) if usize::try_from(len).ok() == Some(cursor.len()) => cursor,
        _ => bytes,
    }
}

/// Hex of the first four payload bytes, or of the whole payload when it
/// is shorter.
pub fn selector_hex(payload: &[u8]) -> String {
    encode_hex(&payload[..payload.len().min(4)])
}

/// `dest` is a plain account or a `MultiAddress` such as `{"id": "5F…"}`.
fn account_of(value: &Value, what: &str) -> Result<String, SieveError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Object(_) => field(value, &["id", "Id"])
            .ok_or_else(|| SieveError::raw_input(format!("{what}: unsupported address {value}")))
            .and_then(|id| to_str(id, what).map(str::to_string)),
        other => Err(SieveError::raw_input(format!("{what}: unexpected {other}"))),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WasmAdapter;

impl WasmAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ChainAdapter for WasmAdapter {
    type EventInput = SubstrateEvent;
    type CallInput = SubstrateCall;
    type Candidate = ContractEmitted;
    type Call = ContractCall;

    fn flavor(&self) -> Flavor {
        Flavor::Wasm
    }

    /// The contracts pallet has no outcome event; the extrinsic failed iff
    /// `system.ExtrinsicFailed` is among its events.
    fn extract_outcome(&self, input: &SubstrateCall) -> Result<ExecutionOutcome, SieveError> {
        let ext = &input.extrinsic;
        let from = ext
            .signer
            .clone()
            .ok_or_else(|| SieveError::raw_input(format!("contracts.call {} is unsigned", input.position())))?;
        let dest = account_of(arg(&ext.args, 0, "contracts.call")?, "dest")?;
        Ok(ExecutionOutcome {
            from,
            to: Some(dest),
            hash: Some(ext.hash.clone()),
            success: !ext.has_event("system", "ExtrinsicFailed"),
        })
    }

    fn extract_logs(&self, input: &SubstrateEvent) -> Result<Vec<ContractEmitted>, SieveError> {
        let event = &input.event;
        if !event.is(CONTRACTS, "ContractEmitted") {
            return Ok(Vec::new());
        }
        let contract = account_of(arg(&event.data, 0, "ContractEmitted")?, "contract")?;
        let payload = decode_hex(to_str(arg(&event.data, 1, "ContractEmitted")?, "ContractEmitted data")?)?;
        if payload.is_empty() {
            return Err(SieveError::raw_input(format!(
                "ContractEmitted from {contract} has an empty payload"
            )));
        }
        Ok(vec![ContractEmitted { contract, payload }])
    }

    fn extract_call(&self, input: &SubstrateCall, _diagnostics: &dyn Diagnostics) -> Result<ContractCall, SieveError> {
        let ext = &input.extrinsic;
        if ext.section != CONTRACTS || ext.method != "call" {
            return Err(SieveError::raw_input(format!(
                "expected contracts.call, got {}.{}",
                ext.section, ext.method
            )));
        }
        let outcome = self.extract_outcome(input)?;
        let args = &ext.args;

        let storage_deposit_limit = match arg(args, 3, "contracts.call").ok() {
            None | Some(Value::Null) => None,
            Some(limit) => Some(to_u256(limit, "storage_deposit_limit")?),
        };
        let raw = decode_hex(to_str(arg(args, 4, "contracts.call")?, "data")?)?;
        let payload = strip_length_prefix(&raw).to_vec();

        let call = WasmCall {
            from: outcome.from,
            dest: outcome.to.unwrap_or_default(),
            value: to_u256(arg(args, 1, "contracts.call")?, "value")?,
            gas_limit: Weight::from_value(arg(args, 2, "contracts.call")?)?,
            storage_deposit_limit,
            data: WasmCallData::Raw(encode_hex(&payload)),
            selector: selector_hex(&payload),
            success: outcome.success,
            hash: ext.hash.clone(),
            block_number: input.block.number,
            block_hash: input.block.hash.clone(),
            timestamp: input.block.timestamp,
        };
        Ok(ContractCall { call, payload })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsieve_core::diagnostics::CollectingDiagnostics;
    use serde_json::json;

    fn call(args: Value, events: Value) -> SubstrateCall {
        serde_json::from_value(json!({
            "block": {"number": 7, "hash": "0xb7", "timestamp": "2023-05-01T00:00:00Z"},
            "extrinsic": {
                "idx": 2, "hash": "0xe2", "signer": "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY",
                "section": "contracts", "method": "call",
                "args": args,
                "events": events
            }
        }))
        .unwrap()
    }

    #[test]
    fn length_prefix_only_when_it_fits() {
        let prefixed = [0x10, 0x63, 0x3a, 0xa5, 0x51];
        assert_eq!(strip_length_prefix(&prefixed), &prefixed[1..]);
        // 0x63 is not a length prefix for the three bytes after it
        let bare = [0x63, 0x3a, 0xa5, 0x51];
        assert_eq!(strip_length_prefix(&bare), &bare[..]);
        assert_eq!(selector_hex(&bare), "0x633aa551");
        assert_eq!(selector_hex(&[0x01]), "0x01");
    }

    #[test]
    fn call_envelope_from_args() {
        let input = call(
            json!([{"id": "5FContract"}, "1000", {"refTime": 5, "proofSize": 6}, null, "0x10633aa551"]),
            json!([{"idx": 3, "section": "system", "method": "ExtrinsicSuccess", "data": []}]),
        );
        let out = WasmAdapter.extract_call(&input, &CollectingDiagnostics::new()).unwrap();
        assert_eq!(out.call.dest, "5FContract");
        assert_eq!(out.call.value, alloy_primitives::U256::from(1000u64));
        assert_eq!(out.call.gas_limit.proof_size, Some(6));
        assert_eq!(out.call.storage_deposit_limit, None);
        assert_eq!(out.call.selector, "0x633aa551");
        assert_eq!(out.payload, vec![0x63, 0x3a, 0xa5, 0x51]);
        assert!(out.call.success);
    }

    #[test]
    fn failed_extrinsic_and_wrong_call() {
        let input = call(
            json!(["5FContract", 0, 1, "0x10", "0x633aa551"]),
            json!([{"idx": 3, "section": "system", "method": "ExtrinsicFailed", "data": []}]),
        );
        let outcome = WasmAdapter.extract_outcome(&input).unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.to.as_deref(), Some("5FContract"));

        let mut other = input.clone();
        other.extrinsic.method = "instantiate".into();
        assert!(WasmAdapter.extract_call(&other, &CollectingDiagnostics::new()).is_err());

        let mut unsigned = input;
        unsigned.extrinsic.signer = None;
        assert!(WasmAdapter.extract_outcome(&unsigned).is_err());
    }

    #[test]
    fn only_contract_events_yield_candidates() {
        let event: SubstrateEvent = serde_json::from_value(json!({
            "block": {"number": 7, "hash": "0xb7", "timestamp": "2023-05-01T00:00:00Z"},
            "event": {"idx": 4, "section": "contracts", "method": "ContractEmitted", "data": ["5FContract", "0x0001"]}
        }))
        .unwrap();
        let logs = WasmAdapter.extract_logs(&event).unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].event_index(), 0);

        let mut other = event.clone();
        other.event.method = "Instantiated".into();
        assert!(WasmAdapter.extract_logs(&other).unwrap().is_empty());

        let mut empty = event;
        empty.event.data[1] = json!("0x");
        assert!(WasmAdapter.extract_logs(&empty).is_err());
    }
}
