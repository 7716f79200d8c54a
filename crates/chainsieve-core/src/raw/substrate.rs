//! Substrate block, extrinsic and event shapes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Block header fields the processors need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateBlock {
    pub number: u64,
    pub hash: String,
    pub timestamp: DateTime<Utc>,
}

/// One runtime event with its positional data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Index of the event within the block.
    pub idx: u32,
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl EventRecord {
    pub fn is(&self, section: &str, method: &str) -> bool {
        self.section == section && self.method == method
    }
}

/// A signed or unsigned extrinsic together with the events it emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateExtrinsic {
    /// Index of the extrinsic within the block.
    pub idx: u32,
    pub hash: String,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub signer: Option<String>,
    pub section: String,
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

impl SubstrateExtrinsic {
    /// First sibling event matching any `(section, method)` pair.
    pub fn find_event(&self, matches: &[(&str, &str)]) -> Option<&EventRecord> {
        self.events
            .iter()
            .find(|e| matches.iter().any(|(s, m)| e.is(s, m)))
    }

    pub fn has_event(&self, section: &str, method: &str) -> bool {
        self.events.iter().any(|e| e.is(section, method))
    }
}

/// Input of an event handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateEvent {
    pub block: SubstrateBlock,
    pub event: EventRecord,
    /// Absent for events emitted outside an extrinsic (e.g. on initialize).
    #[serde(default)]
    pub extrinsic: Option<SubstrateExtrinsic>,
}

/// Input of a call handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstrateCall {
    pub block: SubstrateBlock,
    pub extrinsic: SubstrateExtrinsic,
}

impl SubstrateCall {
    /// Human-readable position for diagnostics.
    pub fn position(&self) -> String {
        format!("{}-{}", self.block.number, self.extrinsic.idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_host_json() {
        let raw = json!({
            "block": {"number": 1_000, "hash": "0xb1", "timestamp": "2022-03-01T10:00:00Z"},
            "extrinsic": {
                "idx": 2,
                "hash": "0xe1",
                "nonce": 5,
                "signer": "0x6be02d1d3665660d22ff9624b7be0551ee1ac91b",
                "section": "ethereum",
                "method": "transact",
                "args": [{}],
                "events": [
                    {"idx": 10, "section": "evm", "method": "Log", "data": []},
                    {"idx": 11, "section": "ethereum", "method": "Executed", "data": []}
                ]
            }
        });
        let call: SubstrateCall = serde_json::from_value(raw).unwrap();
        assert_eq!(call.position(), "1000-2");
        assert!(call.extrinsic.has_event("ethereum", "Executed"));
        assert_eq!(
            call.extrinsic.find_event(&[("evm", "Log"), ("ethereum", "Executed")]).map(|e| e.idx),
            Some(10)
        );
        assert!(call.extrinsic.find_event(&[("system", "ExtrinsicFailed")]).is_none());
    }
}
