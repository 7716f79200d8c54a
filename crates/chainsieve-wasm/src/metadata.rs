//! ink! contract metadata.
//!
//! `cargo contract` has emitted several layouts over time:
//! - unversioned (legacy): `spec` and `types` at the top level, type ids
//!   1-based by position
//! - `V1` / `V2` / `V3`: the same content nested under the version key
//! - `version: "4"`: flat again, with the version as a field
//!
//! Only what argument decoding needs is kept: the type registry, messages
//! with their selectors, and events in declaration order (the event index
//! is the first byte of an event payload).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use chainsieve_core::cache::InterfaceCache;
use chainsieve_core::datasource::{resolve_abi_asset, AssetMap};
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::{encode_hex, is_hex_of_len};
use chainsieve_core::options::DatasourceOptions;
use chainsieve_core::types::DecodedArgs;

use crate::scale::decode_args;

pub type TypeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataVersion {
    Legacy,
    V1,
    V2,
    V3,
    V4,
}

// ─── Type registry ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Primitive {
    Bool,
    Char,
    Str,
    U8,
    U16,
    U32,
    U64,
    U128,
    U256,
    I8,
    I16,
    I32,
    I64,
    I128,
    I256,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Field {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub ty: TypeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct VariantDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
    /// Encoded discriminant; older documents omit it and use the position
    #[serde(default)]
    pub index: Option<u8>,
}

/// Shape of one registered type, as scale-info describes it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TypeDef {
    Primitive(Primitive),
    Composite {
        #[serde(default)]
        fields: Vec<Field>,
    },
    Variant {
        #[serde(default)]
        variants: Vec<VariantDef>,
    },
    Sequence {
        #[serde(rename = "type")]
        ty: TypeId,
    },
    Array {
        len: u32,
        #[serde(rename = "type")]
        ty: TypeId,
    },
    Tuple(Vec<TypeId>),
    Compact {
        #[serde(rename = "type")]
        ty: TypeId,
    },
    BitSequence(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeInfo {
    #[serde(default)]
    pub path: Vec<String>,
    pub def: TypeDef,
}

impl TypeInfo {
    pub fn is_option(&self) -> bool {
        self.path.last().map_or(false, |p| p == "Option")
    }
}

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<TypeId, TypeInfo>,
}

impl TypeRegistry {
    pub fn get(&self, id: TypeId) -> Result<&TypeInfo, SieveError> {
        self.types.get(&id).ok_or_else(|| SieveError::ArgDecodeFailed {
            reason: format!("type {id} is not in the metadata type registry"),
        })
    }

    pub fn is_byte(&self, id: TypeId) -> bool {
        matches!(
            self.types.get(&id).map(|t| &t.def),
            Some(TypeDef::Primitive(Primitive::U8))
        )
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    fn parse(raw: Option<&Value>, version: MetadataVersion) -> Result<Self, String> {
        let Some(Value::Array(entries)) = raw else {
            return Err("missing `types` array".into());
        };

        let mut types = HashMap::with_capacity(entries.len());
        for (pos, entry) in entries.iter().enumerate() {
            let (id, body) = match entry.get("id") {
                Some(id) => {
                    let id = id
                        .as_u64()
                        .and_then(|id| TypeId::try_from(id).ok())
                        .ok_or_else(|| format!("types[{pos}]: invalid id {id}"))?;
                    let body = entry.get("type").ok_or_else(|| format!("types[{pos}]: missing `type`"))?;
                    (id, body)
                }
                None => {
                    let offset = if version == MetadataVersion::Legacy { 1 } else { 0 };
                    (pos as TypeId + offset, entry)
                }
            };
            let info = TypeInfo::deserialize(body).map_err(|e| format!("type {id}: {e}"))?;
            types.insert(id, info);
        }
        Ok(Self { types })
    }

    /// Every id reachable from `root` is registered.
    fn check(&self, root: TypeId) -> Result<(), String> {
        let mut seen = HashSet::new();
        let mut pending = vec![root];
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            let info = self.types.get(&id).ok_or_else(|| format!("unknown type id {id}"))?;
            match &info.def {
                TypeDef::Primitive(_) => {}
                TypeDef::BitSequence(_) => return Err(format!("type {id}: bit sequences are not supported")),
                TypeDef::Composite { fields } => pending.extend(fields.iter().map(|f| f.ty)),
                TypeDef::Variant { variants } => {
                    pending.extend(variants.iter().flat_map(|v| v.fields.iter().map(|f| f.ty)))
                }
                TypeDef::Sequence { ty } | TypeDef::Array { ty, .. } | TypeDef::Compact { ty } => pending.push(*ty),
                TypeDef::Tuple(ids) => pending.extend(ids.iter().copied()),
            }
        }
        Ok(())
    }
}

// ─── Spec ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub label: String,
    pub ty: TypeId,
    /// Events only
    pub indexed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageSpec {
    pub label: String,
    /// Lower-case `0x`-prefixed 4-byte selector
    pub selector: String,
    pub args: Vec<ArgSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSpec {
    pub label: String,
    pub args: Vec<ArgSpec>,
}

/// `label` in current documents, `name` (string or path segments) in V1.
fn label_of(item: &Value) -> Option<String> {
    if let Some(label) = item.get("label").and_then(Value::as_str) {
        return Some(label.to_string());
    }
    match item.get("name")? {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let parts: Option<Vec<&str>> = parts.iter().map(Value::as_str).collect();
            parts.map(|p| p.join("::"))
        }
        _ => None,
    }
}

fn parse_args(owner: &str, item: &Value) -> Result<Vec<ArgSpec>, String> {
    let Some(args) = item.get("args") else {
        return Ok(Vec::new());
    };
    let args = args.as_array().ok_or_else(|| format!("{owner}: `args` must be an array"))?;
    args.iter()
        .enumerate()
        .map(|(i, arg)| {
            let ty = arg
                .get("type")
                .and_then(|t| t.get("type"))
                .and_then(Value::as_u64)
                .and_then(|t| TypeId::try_from(t).ok())
                .ok_or_else(|| format!("{owner}: args[{i}] has no type id"))?;
            Ok(ArgSpec {
                label: label_of(arg).unwrap_or_else(|| i.to_string()),
                ty,
                indexed: arg.get("indexed").and_then(Value::as_bool).unwrap_or(false),
            })
        })
        .collect()
}

fn parse_messages(spec: &Value) -> Result<Vec<MessageSpec>, String> {
    let Some(Value::Array(items)) = spec.get("messages") else {
        return Err("spec has no `messages` array".into());
    };
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let label = label_of(item).ok_or_else(|| format!("messages[{i}] has no label"))?;
            let selector = item
                .get("selector")
                .and_then(Value::as_str)
                .filter(|s| is_hex_of_len(s, 4))
                .ok_or_else(|| format!("message {label}: selector must be 4 bytes of hex"))?
                .to_lowercase();
            Ok(MessageSpec {
                args: parse_args(&label, item)?,
                label,
                selector,
            })
        })
        .collect()
}

fn parse_events(spec: &Value) -> Result<Vec<EventSpec>, String> {
    let items = match spec.get("events") {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(items)) => items,
        Some(_) => return Err("spec `events` must be an array".into()),
    };
    if items.len() > usize::from(u8::MAX) + 1 {
        return Err(format!("{} events do not fit a one-byte index", items.len()));
    }
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let label = label_of(item).ok_or_else(|| format!("events[{i}] has no label"))?;
            Ok(EventSpec {
                args: parse_args(&label, item)?,
                label,
            })
        })
        .collect()
}

/// The sub-document holding `spec` and `types`, with its version.
fn select_document(doc: &Value) -> Result<(MetadataVersion, &Value), String> {
    const NESTED: [(&str, MetadataVersion); 4] = [
        ("V4", MetadataVersion::V4),
        ("V3", MetadataVersion::V3),
        ("V2", MetadataVersion::V2),
        ("V1", MetadataVersion::V1),
    ];
    for (key, version) in NESTED {
        if let Some(inner) = doc.get(key) {
            return Ok((version, inner));
        }
    }

    if let Some(version) = doc.get("version") {
        let version = match version {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return match version.as_str() {
            "4" => Ok((MetadataVersion::V4, doc)),
            other => Err(format!("unsupported metadata version {other}")),
        };
    }

    if doc.get("spec").is_some() {
        return Ok((MetadataVersion::Legacy, doc));
    }
    Err("not an ink! metadata document".into())
}

// ─── Metadata ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEvent {
    pub index: u8,
    pub label: String,
    pub args: DecodedArgs,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub label: String,
    pub selector: String,
    pub args: DecodedArgs,
}

/// A validated ink! metadata document.
#[derive(Debug, Clone)]
pub struct InkMetadata {
    name: String,
    version: MetadataVersion,
    types: TypeRegistry,
    messages: Vec<MessageSpec>,
    events: Vec<EventSpec>,
}

impl InkMetadata {
    /// Parse and validate a metadata document. Every type referenced by a
    /// message or event argument must resolve.
    pub fn parse(name: &str, raw: &str) -> Result<Self, SieveError> {
        let invalid = |reason: String| SieveError::InvalidAbi {
            name: name.to_string(),
            reason,
        };

        let doc: Value = serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;
        let (version, body) = select_document(&doc).map_err(invalid)?;
        let spec = body
            .get("spec")
            .ok_or_else(|| invalid("missing `spec`".into()))?;
        let types = TypeRegistry::parse(body.get("types"), version).map_err(invalid)?;
        let messages = parse_messages(spec).map_err(invalid)?;
        let events = parse_events(spec).map_err(invalid)?;

        let arg_types = messages
            .iter()
            .flat_map(|m| m.args.iter())
            .chain(events.iter().flat_map(|e| e.args.iter()));
        for arg in arg_types {
            types
                .check(arg.ty)
                .map_err(|e| invalid(format!("argument '{}': {e}", arg.label)))?;
        }

        tracing::debug!(
            abi = name,
            version = ?version,
            messages = messages.len(),
            events = events.len(),
            types = types.len(),
            "parsed ink! metadata"
        );
        Ok(Self {
            name: name.to_string(),
            version,
            types,
            messages,
            events,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> MetadataVersion {
        self.version
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn messages(&self) -> &[MessageSpec] {
        &self.messages
    }

    pub fn events(&self) -> &[EventSpec] {
        &self.events
    }

    /// Position of the event labelled `label`; this is the index byte its
    /// payloads start with.
    pub fn event_index(&self, label: &str) -> Option<usize> {
        self.events.iter().position(|e| e.label == label)
    }

    /// Message whose label is `method`. Also accepts the camelCase form of
    /// snake_case labels (`balanceOf` for `balance_of`).
    pub fn message_by_label(&self, method: &str) -> Option<&MessageSpec> {
        self.messages
            .iter()
            .find(|m| m.label == method)
            .or_else(|| self.messages.iter().find(|m| label_matches(&m.label, method)))
    }

    pub fn message_by_selector(&self, selector: &[u8]) -> Option<&MessageSpec> {
        let wanted = encode_hex(selector);
        self.messages.iter().find(|m| m.selector == wanted)
    }

    pub fn selector_of(&self, method: &str) -> Option<String> {
        self.message_by_label(method).map(|m| m.selector.clone())
    }

    /// Decode an event payload: index byte, then the arguments in order.
    /// `Ok(None)` when no event has that index.
    pub fn decode_event(&self, payload: &[u8]) -> Result<Option<DecodedEvent>, SieveError> {
        let Some((&index, mut body)) = payload.split_first() else {
            return Err(SieveError::ArgDecodeFailed {
                reason: "empty event payload".into(),
            });
        };
        let Some(event) = self.events.get(usize::from(index)) else {
            return Ok(None);
        };
        let args = decode_args(&self.types, &event.args, &mut body)?;
        Ok(Some(DecodedEvent {
            index,
            label: event.label.clone(),
            args,
        }))
    }

    /// Decode a message payload (length prefix already stripped): selector,
    /// then the arguments. `Ok(None)` when no message has the selector.
    pub fn decode_message(&self, payload: &[u8]) -> Result<Option<DecodedMessage>, SieveError> {
        if payload.len() < 4 {
            return Ok(None);
        }
        let (selector, mut body) = payload.split_at(4);
        let Some(message) = self.message_by_selector(selector) else {
            return Ok(None);
        };
        let args = decode_args(&self.types, &message.args, &mut body)?;
        Ok(Some(DecodedMessage {
            label: message.label.clone(),
            selector: message.selector.clone(),
            args,
        }))
    }
}

/// Case-insensitive label comparison that also accepts the camelCase form
/// of a snake_case label.
pub fn label_matches(label: &str, wanted: &str) -> bool {
    label.eq_ignore_ascii_case(wanted) || camel_case(label) == wanted
}

fn camel_case(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    let mut upper = false;
    for c in label.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Parsed metadata shared by the WASM processors for the life of the
/// process, keyed by asset name.
#[derive(Debug, Default)]
pub struct MetadataCache {
    documents: InterfaceCache<InkMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(&self, name: &str, raw: &str) -> Result<Arc<InkMetadata>, SieveError> {
        self.documents.get_or_try_insert(name, || InkMetadata::parse(name, raw))
    }

    /// Metadata already parsed under `name`, e.g. during validation.
    pub fn get(&self, name: &str) -> Option<Arc<InkMetadata>> {
        self.documents.get(name)
    }

    pub fn for_datasource(
        &self,
        options: &DatasourceOptions,
        assets: &AssetMap,
    ) -> Result<Option<Arc<InkMetadata>>, SieveError> {
        match resolve_abi_asset(options, assets)? {
            None => Ok(None),
            Some((name, raw)) => self.resolve(name, raw).map(Some),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> Value {
        json!([
            {"id": 0, "type": {"def": {"primitive": "u128"}, "path": ["Balance"]}},
            {"id": 1, "type": {"def": {"composite": {"fields": [{"type": 2, "typeName": "[u8; 32]"}]}},
                               "path": ["ink_env", "types", "AccountId"]}},
            {"id": 2, "type": {"def": {"array": {"len": 32, "type": 3}}}},
            {"id": 3, "type": {"def": {"primitive": "u8"}}}
        ])
    }

    fn v3_doc() -> Value {
        json!({
            "metadataVersion": "0.1.0",
            "V3": {
                "spec": {
                    "constructors": [],
                    "messages": [
                        {"label": "transfer", "selector": "0x84A15DA1",
                         "args": [{"label": "to", "type": {"type": 1}}, {"label": "value", "type": {"type": 0}}]},
                        {"label": "balance_of", "selector": "0x0f755a56",
                         "args": [{"label": "owner", "type": {"type": 1}}]}
                    ],
                    "events": [
                        {"label": "Transfer", "args": []},
                        {"label": "Approval", "args": []}
                    ]
                },
                "types": registry()
            }
        })
    }

    #[test]
    fn nested_version_selected() {
        let meta = InkMetadata::parse("erc20", &v3_doc().to_string()).unwrap();
        assert_eq!(meta.version(), MetadataVersion::V3);
        assert_eq!(meta.messages().len(), 2);
        assert_eq!(meta.messages()[0].selector, "0x84a15da1");
        assert_eq!(meta.types().len(), 4);
    }

    #[test]
    fn event_index_by_label() {
        let meta = InkMetadata::parse("erc20", &v3_doc().to_string()).unwrap();
        assert_eq!(meta.event_index("Transfer"), Some(0));
        assert_eq!(meta.event_index("Approval"), Some(1));
        assert_eq!(meta.event_index("Removal"), None);
    }

    #[test]
    fn v1_names_accepted() {
        let doc = json!({
            "V1": {
                "spec": {
                    "messages": [{"name": ["flip"], "selector": "0x633aa551", "args": []}],
                    "events": [{"name": ["Flipped"], "args": [{"name": "value", "indexed": false, "type": {"type": 0}}]}]
                },
                "types": [{"id": 0, "type": {"def": {"primitive": "bool"}}}]
            }
        });
        let meta = InkMetadata::parse("flipper", &doc.to_string()).unwrap();
        assert_eq!(meta.selector_of("flip").as_deref(), Some("0x633aa551"));
        assert_eq!(meta.events()[0].label, "Flipped");
    }

    #[test]
    fn legacy_types_are_one_based() {
        let doc = json!({
            "metadataVersion": "0.1.0",
            "spec": {
                "messages": [{"name": ["set"], "selector": "0xe8c45eb6",
                              "args": [{"name": "value", "type": {"type": 1}}]}]
            },
            "types": [{"def": {"primitive": "bool"}}]
        });
        let meta = InkMetadata::parse("legacy", &doc.to_string()).unwrap();
        assert_eq!(meta.version(), MetadataVersion::Legacy);
        let decoded = meta.decode_message(&[0xe8, 0xc4, 0x5e, 0xb6, 0x01]).unwrap().unwrap();
        assert_eq!(decoded.label, "set");
    }

    #[test]
    fn camel_case_method_resolves() {
        let meta = InkMetadata::parse("erc20", &v3_doc().to_string()).unwrap();
        assert_eq!(meta.selector_of("balanceOf").as_deref(), Some("0x0f755a56"));
        assert_eq!(meta.selector_of("Transfer").as_deref(), Some("0x84a15da1"));
        assert!(meta.selector_of("burn").is_none());
    }

    #[test]
    fn malformed_documents_rejected() {
        let dangling = json!({
            "version": "4",
            "spec": {"messages": [{"label": "get", "selector": "0x2f865bd9",
                                   "args": [{"label": "x", "type": {"type": 9}}]}]},
            "types": []
        });
        let bad_selector = json!({
            "version": "4",
            "spec": {"messages": [{"label": "get", "selector": "0x2f86"}]},
            "types": []
        });
        let future = json!({"version": "6", "spec": {"messages": []}, "types": []});

        for raw in [
            "{".to_string(),
            "[]".to_string(),
            json!({"source": {}}).to_string(),
            dangling.to_string(),
            bad_selector.to_string(),
            future.to_string(),
        ] {
            let err = InkMetadata::parse("bad", &raw).unwrap_err();
            assert!(matches!(err, SieveError::InvalidAbi { .. }), "{raw}: {err}");
        }
    }

    #[test]
    fn unknown_event_index_is_not_an_error() {
        let meta = InkMetadata::parse("erc20", &v3_doc().to_string()).unwrap();
        assert_eq!(meta.decode_event(&[7]).unwrap(), None);
        assert!(meta.decode_event(&[]).is_err());
        assert_eq!(meta.decode_message(&[0xde, 0xad, 0xbe, 0xef]).unwrap(), None);
    }

    #[test]
    fn cache_keeps_first_document() {
        let cache = MetadataCache::new();
        let a = cache.resolve("erc20", &v3_doc().to_string()).unwrap();
        let b = cache.resolve("erc20", "garbage").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(cache.get("erc20").is_some());
        assert!(cache.get("flipper").is_none());
    }
}
