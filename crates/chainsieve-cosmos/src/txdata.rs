//! Decoding of the transaction data packed inside `MsgEthereumTx`.
//!
//! The inner data is a protobuf `Any` whose concrete type depends on the
//! transaction envelope. Decoding it needs the chain's message registry,
//! which the host injects through `TxDataRegistry`.

use std::collections::HashMap;
use std::sync::RwLock;

use serde_json::{Map, Value};

use chainsieve_core::error::SieveError;

/// Envelope of an Ethermint transaction, from its type URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxDataKind {
    Legacy,
    AccessList,
    DynamicFee,
}

impl TxDataKind {
    /// `/ethermint.evm.v1.DynamicFeeTx` → `DynamicFee`, and so on. Unknown
    /// URLs are treated as legacy.
    pub fn from_type_url(type_url: &str) -> Self {
        match type_url.rsplit('.').next() {
            Some("DynamicFeeTx") => TxDataKind::DynamicFee,
            Some("AccessListTx") => TxDataKind::AccessList,
            _ => TxDataKind::Legacy,
        }
    }
}

/// Decoded inner transaction data.
#[derive(Debug, Clone, PartialEq)]
pub struct TxData {
    pub type_url: String,
    pub kind: TxDataKind,
    /// Proto3 JSON body: camelCase names, 64-bit integers as strings, bytes
    /// as base64
    pub body: Map<String, Value>,
}

/// Message-type registry used to unpack `Any` values.
///
/// # Thread Safety
/// Implementations must be `Send + Sync`; one registry is shared by every
/// processor of a datasource.
pub trait TxDataRegistry: Send + Sync {
    fn decode(&self, any: &Value) -> Result<TxData, SieveError>;
}

/// Decoder for one packed type URL: base64-decoded bytes in, proto3 JSON
/// body out.
pub type BytesDecoder = Box<dyn Fn(&[u8]) -> Result<Map<String, Value>, SieveError> + Send + Sync>;

/// Registry for hosts that already deliver decoded JSON.
///
/// An `Any` carrying a decoded body (`{typeUrl, nonce, gas, ...}`) is passed
/// through. A packed `Any` (`{typeUrl, value: "<base64>"}`) needs a decoder
/// registered for its type URL.
#[derive(Default)]
pub struct JsonTxDataRegistry {
    decoders: RwLock<HashMap<String, BytesDecoder>>,
}

impl JsonTxDataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, type_url: impl Into<String>, decoder: BytesDecoder) {
        self.decoders
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(type_url.into(), decoder);
    }

    pub fn is_registered(&self, type_url: &str) -> bool {
        self.decoders
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(type_url)
    }
}

impl std::fmt::Debug for JsonTxDataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let decoders = self.decoders.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        f.debug_struct("JsonTxDataRegistry")
            .field("decoders", &decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TxDataRegistry for JsonTxDataRegistry {
    fn decode(&self, any: &Value) -> Result<TxData, SieveError> {
        let obj = any
            .as_object()
            .ok_or_else(|| SieveError::raw_input(format!("MsgEthereumTx.data: expected an object, got {any}")))?;
        let type_url = obj
            .get("typeUrl")
            .or_else(|| obj.get("type_url"))
            .and_then(Value::as_str)
            .ok_or_else(|| SieveError::raw_input("MsgEthereumTx.data: missing typeUrl"))?
            .to_string();

        let mut body = obj.clone();
        body.remove("typeUrl");
        body.remove("type_url");

        // Packed form: the only other key is the encoded bytes
        let packed = body.len() == 1 && body.get("value").map_or(false, Value::is_string);
        if packed {
            let encoded = body.get("value").and_then(Value::as_str).unwrap_or_default();
            let bytes = crate::ethermint::decode_base64(encoded, "MsgEthereumTx.data.value")?;
            let decoders = self.decoders.read().unwrap_or_else(|poisoned| poisoned.into_inner());
            let decoder = decoders
                .get(&type_url)
                .ok_or_else(|| SieveError::raw_input(format!("no decoder registered for {type_url}")))?;
            body = decoder(&bytes)?;
        }

        Ok(TxData {
            kind: TxDataKind::from_type_url(&type_url),
            type_url,
            body,
        })
    }
}
