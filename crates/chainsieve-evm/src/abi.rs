//! Contract interfaces built from ABI assets, and argument decoding.
//!
//! # How it works
//! - Logs: `topics[0]` selects the event; indexed parameters are read from
//!   `topics[1..]`, the rest is the ABI-encoded `data` payload
//! - Calls: the first 4 bytes of `data` select the function; the remaining
//!   bytes are the ABI-encoded inputs tuple

use std::sync::Arc;

use alloy_core::dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::{Event, Function, JsonAbi};
use serde_json::Value;

use chainsieve_core::cache::InterfaceCache;
use chainsieve_core::datasource::{resolve_abi_asset, AssetMap};
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::{decode_hex, encode_hex};
use chainsieve_core::log::RawLog;
use chainsieve_core::options::DatasourceOptions;
use chainsieve_core::types::{DecodedArgs, NormalizedValue};

use crate::normalizer::{normalize, param_name};

/// A validated contract interface.
#[derive(Debug, Clone)]
pub struct AbiInterface {
    name: String,
    abi: JsonAbi,
}

impl AbiInterface {
    /// Parse an ABI document: either a bare ABI array or a build artifact
    /// wrapping one under `abi`.
    ///
    /// Every parameter type is resolved up front, so a document that parses
    /// here never fails later for structural reasons.
    pub fn parse(name: &str, raw: &str) -> Result<Self, SieveError> {
        let invalid = |reason: String| SieveError::InvalidAbi {
            name: name.to_string(),
            reason,
        };

        let doc: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        let items = match doc {
            Value::Array(_) => doc,
            Value::Object(mut obj) => match obj.remove("abi") {
                Some(abi @ Value::Array(_)) => abi,
                _ => return Err(invalid("expected an ABI array or an artifact with an `abi` array".into())),
            },
            other => return Err(invalid(format!("expected an ABI array, got {other}"))),
        };
        let abi: JsonAbi = serde_json::from_value(items).map_err(|e| invalid(e.to_string()))?;

        for function in abi.functions() {
            for p in &function.inputs {
                p.resolve()
                    .map_err(|e| invalid(format!("function {}: {e}", function.name)))?;
            }
        }
        for event in abi.events() {
            for p in &event.inputs {
                p.resolve()
                    .map_err(|e| invalid(format!("event {}: {e}", event.name)))?;
            }
        }

        tracing::debug!(
            abi = name,
            functions = abi.functions().count(),
            events = abi.events().count(),
            "parsed contract interface"
        );
        Ok(Self {
            name: name.to_string(),
            abi,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event whose topic hash equals `topic0`.
    pub fn event_by_topic(&self, topic0: &str) -> Option<&Event> {
        self.abi
            .events()
            .find(|e| !e.anonymous && encode_hex(e.selector().as_slice()).eq_ignore_ascii_case(topic0))
    }

    pub fn function_by_selector(&self, selector: &[u8]) -> Option<&Function> {
        self.abi
            .functions()
            .find(|f| f.selector().as_slice() == selector)
    }

    /// Decode a log's arguments. `Ok(None)` when no event of this interface
    /// has the log's first topic.
    pub fn decode_log_args(&self, log: &RawLog) -> Result<Option<DecodedArgs>, SieveError> {
        let Some(topic0) = log.topics.first() else {
            return Ok(None);
        };
        let Some(event) = self.event_by_topic(topic0) else {
            return Ok(None);
        };

        let mut indexed = log.topics.iter().skip(1);
        let mut body_types = Vec::new();
        let mut slots: Vec<(String, Option<NormalizedValue>)> = Vec::with_capacity(event.inputs.len());

        for (i, param) in event.inputs.iter().enumerate() {
            let ty = param.resolve().map_err(decode_failed)?;
            let name = param_name(&param.name, i);
            if param.indexed {
                let topic = indexed.next().ok_or_else(|| SieveError::ArgDecodeFailed {
                    reason: format!("{}: missing topic for indexed parameter '{name}'", event.name),
                })?;
                slots.push((name, Some(decode_topic(topic, &ty)?)));
            } else {
                body_types.push(ty);
                slots.push((name, None));
            }
        }

        let body = decode_hex(&log.data)?;
        let mut values = decode_sequence(body_types, &body)?.into_iter();

        let args = slots
            .into_iter()
            .map(|(name, value)| {
                let value = match value {
                    Some(v) => v,
                    None => values.next().map(normalize).unwrap_or(NormalizedValue::Null),
                };
                (name, value)
            })
            .collect();
        Ok(Some(DecodedArgs::new(args)))
    }

    /// Decode call inputs. `Ok(None)` when `data` is shorter than a selector
    /// or no function has its selector.
    pub fn decode_call_args(&self, data: &str) -> Result<Option<DecodedArgs>, SieveError> {
        let calldata = decode_hex(data)?;
        if calldata.len() < 4 {
            return Ok(None);
        }
        let Some(function) = self.function_by_selector(&calldata[..4]) else {
            return Ok(None);
        };

        let types = function
            .inputs
            .iter()
            .map(|p| p.resolve().map_err(decode_failed))
            .collect::<Result<Vec<_>, _>>()?;
        let values = decode_sequence(types, &calldata[4..])?;

        let args = function
            .inputs
            .iter()
            .enumerate()
            .zip(values)
            .map(|((i, p), v)| (param_name(&p.name, i), normalize(v)))
            .collect();
        Ok(Some(DecodedArgs::new(args)))
    }
}

fn decode_failed(e: impl std::fmt::Display) -> SieveError {
    SieveError::ArgDecodeFailed {
        reason: e.to_string(),
    }
}

fn decode_sequence(types: Vec<DynSolType>, data: &[u8]) -> Result<Vec<DynSolValue>, SieveError> {
    if types.is_empty() {
        return Ok(Vec::new());
    }
    match DynSolType::Tuple(types).abi_decode_sequence(data).map_err(decode_failed)? {
        DynSolValue::Tuple(vals) => Ok(vals),
        other => Ok(vec![other]),
    }
}

/// Decode a single indexed topic.
///
/// Reference types (string, bytes, arrays, tuples) are stored as the hash of
/// their encoding and cannot be recovered; the raw 32 bytes are returned.
fn decode_topic(topic: &str, ty: &DynSolType) -> Result<NormalizedValue, SieveError> {
    let bytes = decode_hex(topic)?;
    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => Ok(NormalizedValue::Bytes(bytes)),
        _ => ty
            .abi_decode(&bytes)
            .map(normalize)
            .map_err(|e| decode_failed(format!("topic decode: {e}"))),
    }
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Parsed interfaces shared by every EVM processor for the life of the
/// process. Interfaces are keyed by ABI name only; datasources that reuse a
/// name must reference the same document.
#[derive(Debug, Default)]
pub struct AbiCache {
    interfaces: InterfaceCache<AbiInterface>,
}

impl AbiCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, name: &str, raw: &str) -> Result<Arc<AbiInterface>, SieveError> {
        self.interfaces
            .get_or_try_insert(name, || AbiInterface::parse(name, raw))
    }

    /// The interface named by `options.abi`, or `None` when no ABI is set.
    pub fn for_datasource(
        &self,
        options: &DatasourceOptions,
        assets: &AssetMap,
    ) -> Result<Option<Arc<AbiInterface>>, SieveError> {
        match resolve_abi_asset(options, assets)? {
            None => Ok(None),
            Some((name, raw)) => self.resolve(name, raw).map(Some),
        }
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}
