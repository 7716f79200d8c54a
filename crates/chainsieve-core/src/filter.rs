//! Filter engine: shape validation and per-record evaluation.
//!
//! Validation runs once per datasource registration and reports every
//! violated field at once. Evaluation runs per record and is format-agnostic:
//! it only sees `RawLog` / `NormalizedCall` values produced by an adapter.
//!
//! Topic matching follows Ethereum bloom-filter semantics: position `i` of
//! the filter constrains `topics[i]` of the log, and an absent token is a
//! wildcard.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call::NormalizedCall;
use crate::error::{FilterViolation, SieveError};
use crate::hexutil::{hex_equals, is_evm_address, is_hex_string};
use crate::log::{RawLog, MAX_TOPICS};
use crate::options::AddressFilter;
use crate::signature::{event_signature_to_topic, function_signature_to_selector};

// ─── Filter types ────────────────────────────────────────────────────────────

/// Event filter for EVM flavors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    /// Up to four positional tokens: a hex topic, an event signature, or
    /// `null` for "any".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<Option<String>>>,
}

impl LogFilter {
    pub fn with_topics<I, S>(topics: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            topics: Some(topics.into_iter().map(|t| t.map(Into::into)).collect()),
        }
    }

    /// Every non-wildcard slot resolved to its topic hash, with its position.
    pub fn resolved_topics(&self) -> Result<Vec<(usize, String)>, SieveError> {
        let Some(topics) = &self.topics else {
            return Ok(Vec::new());
        };
        topics
            .iter()
            .take(MAX_TOPICS)
            .enumerate()
            .filter_map(|(i, t)| non_empty(t.as_deref()).map(|t| (i, t)))
            .map(|(i, t)| event_signature_to_topic(t).map(|hash| (i, hash)))
            .collect()
    }
}

/// Call filter for EVM flavors. `method` is accepted as an alias of
/// `function`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Function signature or hex selector.
    #[serde(default, alias = "method", skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    /// Explicit 4-byte selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
}

// ─── Shape validation ────────────────────────────────────────────────────────

/// Constraint on one filter field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRule {
    /// 20-byte hex address
    EvmAddress,
    /// Any string
    Text,
    /// Any string or null
    NullableText,
    /// Array of at most four hex-or-signature-or-null tokens
    TopicList,
    /// Function signature or hex selector of at least four bytes
    FunctionToken,
    /// Hex selector of at least four bytes
    HexSelector,
}

/// Allowed fields of one filter kind. Fields not listed are rejected.
#[derive(Debug, Clone, Copy)]
pub struct FilterShape {
    pub kind: &'static str,
    pub fields: &'static [(&'static str, FieldRule)],
    /// Groups of fields of which at most one may be set.
    pub exclusive: &'static [&'static [&'static str]],
}

pub const LOG_FILTER_SHAPE: FilterShape = FilterShape {
    kind: "event",
    fields: &[("topics", FieldRule::TopicList)],
    exclusive: &[],
};

pub const CALL_FILTER_SHAPE: FilterShape = FilterShape {
    kind: "call",
    fields: &[
        ("from", FieldRule::EvmAddress),
        ("function", FieldRule::FunctionToken),
        ("method", FieldRule::FunctionToken),
        ("selector", FieldRule::HexSelector),
    ],
    exclusive: &[&["function", "method"]],
};

impl FilterShape {
    /// Collect every violation in `raw`. An absent or `null` filter is valid.
    pub fn violations(&self, raw: &Value) -> Vec<FilterViolation> {
        let obj = match raw {
            Value::Null => return Vec::new(),
            Value::Object(obj) => obj,
            other => {
                return vec![FilterViolation::new(
                    "<filter>",
                    format!("expected an object, got {}", json_kind(other)),
                )]
            }
        };

        let mut out = Vec::new();
        for (key, value) in obj {
            match self.fields.iter().find(|(name, _)| name == key) {
                Some((_, rule)) => check_field(key, *rule, value, &mut out),
                None => out.push(FilterViolation::new(key.as_str(), "unknown field")),
            }
        }

        for group in self.exclusive {
            let set: Vec<_> = group
                .iter()
                .filter(|f| obj.get(**f).map_or(false, |v| !v.is_null()))
                .collect();
            if set.len() > 1 {
                out.push(FilterViolation::new(
                    group.join("|"),
                    "only one of these fields may be set",
                ));
            }
        }
        out
    }

    pub fn check(&self, raw: &Value) -> Result<(), SieveError> {
        let violations = self.violations(raw);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SieveError::InvalidFilterSpec {
                kind: self.kind.to_string(),
                violations,
            })
        }
    }

    /// Validate `raw` and deserialize it into the typed filter.
    pub fn parse<T: DeserializeOwned + Default>(&self, raw: Option<&Value>) -> Result<T, SieveError> {
        match raw {
            None | Some(Value::Null) => Ok(T::default()),
            Some(value) => {
                self.check(value)?;
                serde_json::from_value(value.clone()).map_err(|e| SieveError::InvalidFilterSpec {
                    kind: self.kind.to_string(),
                    violations: vec![FilterViolation::new("<filter>", e.to_string())],
                })
            }
        }
    }
}

fn check_field(key: &str, rule: FieldRule, value: &Value, out: &mut Vec<FilterViolation>) {
    if value.is_null() {
        return;
    }

    match rule {
        FieldRule::EvmAddress => match value.as_str() {
            Some(s) if is_evm_address(s) => {}
            _ => out.push(FilterViolation::new(key, "must be an Ethereum address")),
        },
        FieldRule::Text | FieldRule::NullableText => {
            if !value.is_string() {
                out.push(FilterViolation::new(key, "must be a string"));
            }
        }
        FieldRule::FunctionToken => match value.as_str() {
            Some(s) => {
                if let Err(e) = function_signature_to_selector(s) {
                    out.push(FilterViolation::new(key, e.to_string()));
                }
            }
            None => out.push(FilterViolation::new(key, "must be a string")),
        },
        FieldRule::HexSelector => match value.as_str() {
            Some(s) if is_hex_string(s) && s.len() >= 10 => {}
            _ => out.push(FilterViolation::new(key, "must be a hex selector of at least 4 bytes")),
        },
        FieldRule::TopicList => {
            let Some(items) = value.as_array() else {
                out.push(FilterViolation::new(key, "must be an array"));
                return;
            };
            if items.len() > MAX_TOPICS {
                out.push(FilterViolation::new(
                    key,
                    format!("at most {MAX_TOPICS} topics allowed, got {}", items.len()),
                ));
            }
            for (i, item) in items.iter().enumerate() {
                let field = format!("{key}[{i}]");
                match item {
                    Value::Null => {}
                    Value::String(s) if s.is_empty() => {}
                    Value::String(s) => {
                        if event_signature_to_topic(s).is_err() {
                            out.push(FilterViolation::new(
                                field,
                                "value must be either null, a hex string or an event signature",
                            ));
                        }
                    }
                    other => out.push(FilterViolation::new(
                        field,
                        format!("expected string or null, got {}", json_kind(other)),
                    )),
                }
            }
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.is_empty())
}

// ─── Evaluation ──────────────────────────────────────────────────────────────

/// Positional topic match. No filter, or no topics, matches every log.
pub fn evaluate_log_filter(filter: Option<&LogFilter>, log: &RawLog) -> Result<bool, SieveError> {
    let Some(filter) = filter else {
        return Ok(true);
    };

    for (i, expected) in filter.resolved_topics()? {
        if !hex_equals(Some(&expected), log.topics.get(i).map(String::as_str)) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Address check (when configured) followed by the topic filter.
pub fn log_matches(
    address: Option<&str>,
    filter: Option<&LogFilter>,
    log: &RawLog,
) -> Result<bool, SieveError> {
    if let Some(address) = address {
        if !hex_equals(Some(address), Some(&log.address)) {
            return Ok(false);
        }
    }
    evaluate_log_filter(filter, log)
}

/// Sender, target address, function and selector checks for an EVM call.
///
/// A configured contract address never matches a contract-creation call;
/// use `AddressFilter::CreationOnly` to select those.
pub fn evaluate_call_filter(
    filter: Option<&CallFilter>,
    address: &AddressFilter,
    call: &NormalizedCall,
) -> Result<bool, SieveError> {
    match address {
        AddressFilter::Any => {}
        AddressFilter::Contract(addr) => {
            if !hex_equals(Some(addr), call.to.as_deref()) {
                return Ok(false);
            }
        }
        AddressFilter::CreationOnly => {
            if call.to.is_some() {
                return Ok(false);
            }
        }
    }

    let Some(filter) = filter else {
        return Ok(true);
    };

    if let Some(from) = non_empty(filter.from.as_deref()) {
        if !hex_equals(Some(from), Some(&call.from)) {
            return Ok(false);
        }
    }

    if let Some(function) = non_empty(filter.function.as_deref()) {
        let selector = function_signature_to_selector(function)?;
        if !data_starts_with(&call.data, &selector) {
            return Ok(false);
        }
    }

    if let Some(selector) = non_empty(filter.selector.as_deref()) {
        if !data_starts_with(&call.data, selector) {
            return Ok(false);
        }
    }

    Ok(true)
}

fn data_starts_with(data: &str, prefix: &str) -> bool {
    data.len() >= prefix.len()
        && data
            .get(..prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(prefix))
}
