//! Ethereum transactions and logs as Substrate node clients render them in
//! JSON.
//!
//! Frontier's `ethereum.transact` argument is a tagged enum
//! (`{"legacy": {...}}`, `{"eip1559": {...}}`, ...) on current runtimes and
//! an untagged legacy object on historical ones. Keys may be camelCase or
//! snake_case and tags may be capitalized depending on the client.

use alloy_primitives::U256;
use serde_json::{Map, Value};

use chainsieve_core::call::{AccessListItem, TxEnvelope, TxSignature};
use chainsieve_core::error::SieveError;
use chainsieve_core::log::RawLog;
use chainsieve_core::raw::value::{field, to_i64, to_str, to_u256, to_u64};

/// Call target of a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxAction {
    Call(String),
    Create,
}

/// The fields of a transaction a call record needs, independent of its type.
#[derive(Debug, Clone, PartialEq)]
pub struct EthTransaction {
    pub envelope: TxEnvelope,
    /// -1 for untyped legacy transactions
    pub chain_id: i64,
    pub nonce: u64,
    pub gas_limit: U256,
    pub value: U256,
    pub input: String,
    pub action: TxAction,
    pub signature: TxSignature,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxType {
    Legacy,
    Eip2930,
    Eip1559,
    Eip7702,
}

impl TxType {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "legacy" => Some(TxType::Legacy),
            "eip2930" => Some(TxType::Eip2930),
            "eip1559" => Some(TxType::Eip1559),
            "eip7702" => Some(TxType::Eip7702),
            _ => None,
        }
    }
}

/// Split a tagged transaction into its type and body. An object that is not
/// a single known tag is an untagged legacy transaction.
fn discriminate(raw: &Value) -> Result<(TxType, &Map<String, Value>), SieveError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| SieveError::raw_input(format!("transaction: expected an object, got {raw}")))?;

    if obj.len() == 1 {
        if let Some((tag, body)) = obj.iter().next() {
            if let (Some(ty), Some(body)) = (TxType::from_tag(tag), body.as_object()) {
                return Ok((ty, body));
            }
        }
    }
    Ok((TxType::Legacy, obj))
}

pub fn parse_eth_transaction(raw: &Value) -> Result<EthTransaction, SieveError> {
    let (ty, body) = discriminate(raw)?;
    let tx = Value::Object(body.clone());
    let get = |names: &[&str]| field(&tx, names).cloned().unwrap_or(Value::Null);

    let nonce = to_u64(&get(&["nonce"]), "nonce")?;
    let gas_limit = to_u256(&get(&["gasLimit", "gas_limit"]), "gasLimit")?;
    let value = to_u256(&get(&["value"]), "value")?;
    let input = match field(&tx, &["input", "data"]) {
        Some(v) => to_str(v, "input")?.to_string(),
        None => "0x".to_string(),
    };
    let action = match field(&tx, &["action"]) {
        Some(action) => parse_action(action)?,
        None => match field(&tx, &["destination", "to"]) {
            Some(dest) => parse_action(dest)?,
            None => TxAction::Create,
        },
    };

    let envelope = match ty {
        TxType::Legacy => TxEnvelope::Legacy {
            gas_price: to_u256(&get(&["gasPrice", "gas_price"]), "gasPrice")?,
        },
        TxType::Eip2930 => TxEnvelope::Eip2930 {
            gas_price: to_u256(&get(&["gasPrice", "gas_price"]), "gasPrice")?,
            access_list: parse_access_list(field(&tx, &["accessList", "access_list"]))?,
        },
        TxType::Eip1559 => TxEnvelope::Eip1559 {
            max_fee_per_gas: to_u256(&get(&["maxFeePerGas", "max_fee_per_gas"]), "maxFeePerGas")?,
            max_priority_fee_per_gas: to_u256(
                &get(&["maxPriorityFeePerGas", "max_priority_fee_per_gas"]),
                "maxPriorityFeePerGas",
            )?,
            access_list: parse_access_list(field(&tx, &["accessList", "access_list"]))?,
        },
        TxType::Eip7702 => TxEnvelope::Eip7702 {
            max_fee_per_gas: to_u256(&get(&["maxFeePerGas", "max_fee_per_gas"]), "maxFeePerGas")?,
            max_priority_fee_per_gas: to_u256(
                &get(&["maxPriorityFeePerGas", "max_priority_fee_per_gas"]),
                "maxPriorityFeePerGas",
            )?,
            access_list: parse_access_list(field(&tx, &["accessList", "access_list"]))?,
            authorization_list: field(&tx, &["authorizationList", "authorization_list"])
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        },
    };

    let chain_id = match ty {
        TxType::Legacy => -1,
        _ => match field(&tx, &["chainId", "chain_id"]) {
            Some(v) => to_i64(v, "chainId")?,
            None => -1,
        },
    };

    Ok(EthTransaction {
        envelope,
        chain_id,
        nonce,
        gas_limit,
        value,
        input,
        action,
        signature: parse_signature(&tx)?,
    })
}

/// `{call: addr}` / `{create: null}`, or a bare address for `destination`.
pub fn parse_action(raw: &Value) -> Result<TxAction, SieveError> {
    match raw {
        Value::Null => Ok(TxAction::Create),
        Value::String(addr) => Ok(TxAction::Call(addr.clone())),
        Value::Object(obj) => {
            for (key, value) in obj {
                match key.to_ascii_lowercase().as_str() {
                    "create" => return Ok(TxAction::Create),
                    "call" => return Ok(TxAction::Call(to_str(value, "action.call")?.to_string())),
                    _ => {}
                }
            }
            Err(SieveError::raw_input(format!("action: unknown variant {raw}")))
        }
        other => Err(SieveError::raw_input(format!("action: unexpected {other}"))),
    }
}

pub fn parse_access_list(raw: Option<&Value>) -> Result<Vec<AccessListItem>, SieveError> {
    let Some(items) = raw.and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    items
        .iter()
        .map(|item| {
            let address = field(item, &["address"])
                .ok_or_else(|| SieveError::raw_input("accessList: entry without address"))?;
            let storage_keys = field(item, &["storageKeys", "storage_keys", "slots"])
                .and_then(Value::as_array)
                .map(|keys| {
                    keys.iter()
                        .map(|k| to_str(k, "storageKeys").map(str::to_string))
                        .collect::<Result<Vec<_>, _>>()
                })
                .transpose()?
                .unwrap_or_default();
            Ok(AccessListItem {
                address: to_str(address, "accessList.address")?.to_string(),
                storage_keys,
            })
        })
        .collect()
}

/// Signature fields; a nested `signature` object wins over top-level
/// `r`/`s`/`v`. Typed transactions carry `oddYParity` in place of `v`.
pub fn parse_signature(tx: &Value) -> Result<TxSignature, SieveError> {
    let source = field(tx, &["signature"]).filter(|s| s.is_object()).unwrap_or(tx);

    let text = |name: &str| -> Result<Option<String>, SieveError> {
        field(source, &[name])
            .map(|v| to_str(v, name).map(str::to_string))
            .transpose()
    };

    let v = match field(source, &["v"]) {
        Some(v) => Some(to_u64(v, "v")?),
        None => match field(tx, &["oddYParity", "odd_y_parity"]) {
            Some(Value::Bool(odd)) => Some(u64::from(*odd)),
            Some(other) => Some(to_u64(other, "oddYParity")?),
            None => None,
        },
    };

    Ok(TxSignature {
        r: text("r")?,
        s: text("s")?,
        v,
    })
}

/// One `{address, topics, data}` log object.
pub fn parse_log(raw: &Value) -> Result<RawLog, SieveError> {
    let address = field(raw, &["address"]).ok_or_else(|| SieveError::raw_input("log: missing address"))?;
    let topics = match field(raw, &["topics"]) {
        Some(Value::Array(items)) => items
            .iter()
            .map(|t| to_str(t, "log.topics").map(str::to_string))
            .collect::<Result<Vec<_>, _>>()?,
        Some(other) => return Err(SieveError::raw_input(format!("log.topics: expected an array, got {other}"))),
        None => Vec::new(),
    };
    let data = match field(raw, &["data"]) {
        Some(v) => to_str(v, "log.data")?.to_string(),
        None => "0x".to_string(),
    };
    Ok(RawLog::new(to_str(address, "log.address")?, topics, data))
}
