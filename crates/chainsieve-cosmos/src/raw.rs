//! Cosmos block, transaction, event and message shapes as handed over by
//! the host.
//!
//! ABCI events follow the usual structure: a `type` string plus a list of
//! `{key, value}` string attributes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use chainsieve_core::raw::value::to_u64;

/// Heights arrive as numbers or decimal strings depending on the client.
fn lenient_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    let v = Value::deserialize(d)?;
    to_u64(&v, "height").map_err(serde::de::Error::custom)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmosBlock {
    #[serde(deserialize_with = "lenient_u64")]
    pub height: u64,
    /// Block id (hash)
    pub id: String,
    pub time: DateTime<Utc>,
}

/// Transaction result fields used for success detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmosTx {
    pub hash: String,
    /// ABCI result code, 0 on success
    #[serde(default)]
    pub code: u32,
    /// Raw log: JSON array of per-message logs on older SDKs, empty on newer
    #[serde(default)]
    pub log: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbciEvent {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl AbciEvent {
    /// Values of every attribute named `key`, in order.
    pub fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.attributes
            .iter()
            .filter(move |a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

/// Input of an event handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmosEvent {
    pub block: CosmosBlock,
    pub tx: CosmosTx,
    /// Index of the message that emitted the event
    #[serde(default)]
    pub idx: u32,
    pub event: AbciEvent,
}

/// `MsgEthereumTx` with its inner transaction data still packed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MsgEthereumTx {
    #[serde(default)]
    pub type_url: Option<String>,
    pub from: String,
    pub hash: String,
    /// Protobuf `Any`: `{typeUrl, value}` or an already decoded body
    pub data: Value,
}

/// Input of a call handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CosmosMessage {
    pub block: CosmosBlock,
    pub tx: CosmosTx,
    /// Position of the message in the transaction
    #[serde(default)]
    pub idx: u32,
    pub msg: MsgEthereumTx,
}

impl CosmosMessage {
    pub fn position(&self) -> String {
        format!("{}-{}", self.block.height, self.idx)
    }
}
