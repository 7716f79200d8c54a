//! Decoded argument values.
//!
//! EVM ABI values and SCALE-encoded ink! values are normalized into the same
//! `NormalizedValue` tree so that consumers of a `NormalizedLog`,
//! `NormalizedCall` or `WasmEvent` never deal with flavor-specific types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoded, normalized argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum NormalizedValue {
    Uint(#[serde(with = "decimal")] u128),
    /// Uints wider than u128 stored as decimal string
    BigUint(String),
    Int(#[serde(with = "decimal")] i128),
    /// Ints wider than i128 stored as decimal string
    BigInt(String),
    Bool(bool),
    Bytes(Vec<u8>),
    Str(String),
    /// EVM address, 0x-prefixed hex
    Address(String),
    Array(Vec<NormalizedValue>),
    Tuple(Vec<(String, NormalizedValue)>),
    Null,
}

/// 128-bit integers as decimal strings; JSON numbers stop at 64 bits.
mod decimal {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::fmt::Display;
    use std::str::FromStr;

    pub fn serialize<T: Display, S: Serializer>(v: &T, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(v)
    }

    pub fn deserialize<'de, T, D>(d: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let s = String::deserialize(d)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl NormalizedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, NormalizedValue::Null)
    }

    pub fn as_address(&self) -> Option<&str> {
        match self {
            NormalizedValue::Address(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            NormalizedValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            NormalizedValue::Bytes(b) => Some(b.as_slice()),
            _ => None,
        }
    }
}

impl fmt::Display for NormalizedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizedValue::Uint(v) => write!(f, "{v}"),
            NormalizedValue::BigUint(v) => write!(f, "{v}"),
            NormalizedValue::Int(v) => write!(f, "{v}"),
            NormalizedValue::BigInt(v) => write!(f, "{v}"),
            NormalizedValue::Bool(v) => write!(f, "{v}"),
            NormalizedValue::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            NormalizedValue::Str(s) => write!(f, "{s}"),
            NormalizedValue::Address(a) => write!(f, "{a}"),
            NormalizedValue::Array(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            NormalizedValue::Tuple(fields) => {
                let parts: Vec<_> = fields.iter().map(|(k, v)| format!("{k}: {v}")).collect();
                write!(f, "{{{}}}", parts.join(", "))
            }
            NormalizedValue::Null => write!(f, "null"),
        }
    }
}

/// Ordered, named arguments decoded from a log, call or contract message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DecodedArgs(pub Vec<(String, NormalizedValue)>);

impl DecodedArgs {
    pub fn new(fields: Vec<(String, NormalizedValue)>) -> Self {
        Self(fields)
    }

    /// Look up an argument by name.
    pub fn get(&self, name: &str) -> Option<&NormalizedValue> {
        self.0.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Look up an argument by position.
    pub fn at(&self, index: usize) -> Option<&NormalizedValue> {
        self.0.get(index).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, NormalizedValue)> {
        self.0.iter()
    }
}
