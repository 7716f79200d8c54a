//! WASM event and call processors and the `substrate/Wasm` plugin.
//!
//! Both processors decode through the datasource's ink! metadata. The last
//! decoded payload is kept so a filter pass followed by a transform pass
//! over the same record decodes once.

use std::sync::Arc;

use serde_json::Value;

use chainsieve_core::adapter::{ChainAdapter, Flavor};
use chainsieve_core::cache::{LabelMemo, SingleSlot};
use chainsieve_core::datasource::{AssetMap, Datasource};
use chainsieve_core::diagnostics::{DiagnosticKind, Diagnostics};
use chainsieve_core::error::SieveError;
use chainsieve_core::hexutil::{encode_hex, EMPTY_ADDRESS};
use chainsieve_core::processor::{degrade_to_no_match, DatasourcePlugin, DynHandler, HandlerContext, HandlerProcessor};
use chainsieve_core::query::{account_value, build_call_query, entity, CallQueryInput, QuerySpec, WASM_CALL_LAYOUT};
use chainsieve_core::raw::{SubstrateCall, SubstrateEvent};

use crate::adapter::{ContractCall, ContractEmitted, WasmAdapter};
use crate::metadata::{DecodedEvent, DecodedMessage, InkMetadata, MetadataCache};
use crate::types::{
    WasmCall, WasmCallData, WasmCallFilter, WasmEvent, WasmEventFilter, WASM_CALL_FILTER_SHAPE,
    WASM_EVENT_FILTER_SHAPE,
};

fn same_account(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Metadata for the record's datasource. A document that fails to load is
/// reported and treated as absent.
fn metadata_for(metadata: &MetadataCache, ctx: &HandlerContext<'_>, what: &str) -> Option<Arc<InkMetadata>> {
    match metadata.for_datasource(&ctx.ds.options, ctx.assets) {
        Ok(found) => found,
        Err(e) => {
            ctx.diagnostics.emit(
                DiagnosticKind::ArgDecodeFailed,
                &format!("Unable to parse {what} arguments, will be omitted from result: {e}"),
            );
            None
        }
    }
}

/// Metadata for a dictionary query. Documents `validate` already parsed are
/// reused, anything else is loaded from the context's assets.
fn query_metadata(metadata: &MetadataCache, ctx: &HandlerContext<'_>) -> Option<Arc<InkMetadata>> {
    if let Some(found) = ctx.ds.options.abi.as_deref().and_then(|name| metadata.get(name)) {
        return Some(found);
    }
    match metadata.for_datasource(&ctx.ds.options, ctx.assets) {
        Ok(found) => found,
        Err(e) => {
            ctx.diagnostics.emit(
                DiagnosticKind::QueryConditionDropped,
                &format!("Unable to load metadata for the dictionary query: {e}"),
            );
            None
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

pub struct WasmEventProcessor {
    adapter: Arc<WasmAdapter>,
    metadata: Arc<MetadataCache>,
    last_event: SingleSlot<(String, Vec<u8>), DecodedEvent>,
    event_indexes: LabelMemo<usize>,
}

impl WasmEventProcessor {
    pub fn new(adapter: Arc<WasmAdapter>, metadata: Arc<MetadataCache>) -> Self {
        Self {
            adapter,
            metadata,
            last_event: SingleSlot::new(),
            event_indexes: LabelMemo::new(),
        }
    }

    /// Decode `emitted` once per `(abi, payload)`; failures are reported and
    /// remembered as `None`.
    fn decode(&self, ctx: &HandlerContext<'_>, emitted: &ContractEmitted) -> Option<Arc<DecodedEvent>> {
        let metadata = metadata_for(&self.metadata, ctx, "event")?;
        let key = (metadata.name().to_string(), emitted.payload.clone());
        self.last_event.get_or_insert_with(&key, || match metadata.decode_event(&emitted.payload) {
            Ok(decoded) => decoded,
            Err(e) => {
                ctx.diagnostics.emit(
                    DiagnosticKind::ArgDecodeFailed,
                    &format!("Unable to parse event arguments, will be omitted from result: {e}"),
                );
                None
            }
        })
    }

    fn event_index(&self, metadata: &InkMetadata, label: &str) -> Option<usize> {
        self.event_indexes
            .get_or_resolve(metadata.name(), label, || metadata.event_index(label))
    }

    fn matches(
        &self,
        ctx: &HandlerContext<'_>,
        filter: &WasmEventFilter,
        input: &SubstrateEvent,
    ) -> Result<bool, SieveError> {
        let Some(emitted) = self.adapter.extract_logs(input)?.into_iter().next() else {
            return Ok(false);
        };

        if let Some(contract) = ctx.ds.options.wasm_contract() {
            if !same_account(contract, &emitted.contract) {
                return Ok(false);
            }
        }
        if let Some(contract) = filter.contract.as_deref() {
            if !same_account(contract, &emitted.contract) {
                return Ok(false);
            }
        }
        if let Some(from) = filter.from.as_deref() {
            let signer = input
                .extrinsic
                .as_ref()
                .and_then(|ext| ext.signer.as_deref())
                .unwrap_or(EMPTY_ADDRESS);
            if !same_account(from, signer) {
                return Ok(false);
            }
        }
        if let Some(identifier) = filter.identifier.as_deref() {
            return Ok(self
                .decode(ctx, &emitted)
                .is_some_and(|decoded| decoded.label == identifier));
        }
        Ok(true)
    }
}

impl HandlerProcessor for WasmEventProcessor {
    type Filter = WasmEventFilter;
    type Input = SubstrateEvent;
    type Output = WasmEvent;

    fn kind(&self) -> &'static str {
        self.adapter.flavor().event_handler_kind()
    }

    fn filter_validator(&self, raw: Option<&Value>) -> Result<WasmEventFilter, SieveError> {
        WASM_EVENT_FILTER_SHAPE.parse(raw)
    }

    fn filter_processor(&self, ctx: &HandlerContext<'_>, filter: &WasmEventFilter, input: &SubstrateEvent) -> bool {
        degrade_to_no_match(self.matches(ctx, filter, input), ctx.diagnostics)
    }

    fn transformer(
        &self,
        ctx: &HandlerContext<'_>,
        _filter: &WasmEventFilter,
        input: &SubstrateEvent,
    ) -> Result<Vec<WasmEvent>, SieveError> {
        let records = self
            .adapter
            .extract_logs(input)?
            .into_iter()
            .map(|emitted| {
                let decoded = self.decode(ctx, &emitted);
                WasmEvent {
                    from: input
                        .extrinsic
                        .as_ref()
                        .and_then(|ext| ext.signer.clone())
                        .unwrap_or_else(|| EMPTY_ADDRESS.to_string()),
                    event_index: emitted.event_index(),
                    identifier: decoded.as_ref().map(|d| d.label.clone()),
                    args: decoded.map(|d| d.args.clone()),
                    contract: emitted.contract,
                    transaction_hash: input.extrinsic.as_ref().map(|ext| ext.hash.clone()),
                    block_number: input.block.number,
                    block_hash: input.block.hash.clone(),
                    timestamp: input.block.timestamp,
                }
            })
            .collect::<Vec<_>>();

        tracing::trace!(kind = HandlerProcessor::kind(self), records = records.len(), "transformed event");
        Ok(records)
    }

    /// `contractEmitteds` narrowed by contract, sender and the event index
    /// the identifier resolves to. No contract, no query.
    fn dictionary_query(&self, ctx: &HandlerContext<'_>, filter: &WasmEventFilter) -> Option<QuerySpec> {
        let contract = filter
            .contract
            .as_deref()
            .or_else(|| ctx.ds.options.wasm_contract())
            .filter(|c| !c.is_empty())?;

        let mut query = QuerySpec::new(entity::CONTRACT_EMITTEDS);
        query.push("contract", account_value(contract));
        if let Some(from) = filter.from.as_deref().filter(|f| !f.is_empty()) {
            query.push("from", account_value(from));
        }
        if let Some(identifier) = filter.identifier.as_deref() {
            let index = query_metadata(&self.metadata, ctx)
                .and_then(|metadata| self.event_index(&metadata, identifier));
            match index {
                Some(index) => query.push("eventIndex", index.to_string()),
                None => ctx.diagnostics.emit(
                    DiagnosticKind::QueryConditionDropped,
                    &format!("Unable to resolve event '{identifier}', it will be omitted from the dictionary query"),
                ),
            }
        }
        Some(query)
    }
}

// ─── Calls ───────────────────────────────────────────────────────────────────

pub struct WasmCallProcessor {
    adapter: Arc<WasmAdapter>,
    metadata: Arc<MetadataCache>,
    last_message: SingleSlot<(String, Vec<u8>), DecodedMessage>,
    selectors: LabelMemo<String>,
}

impl WasmCallProcessor {
    pub fn new(adapter: Arc<WasmAdapter>, metadata: Arc<MetadataCache>) -> Self {
        Self {
            adapter,
            metadata,
            last_message: SingleSlot::new(),
            selectors: LabelMemo::new(),
        }
    }

    fn decode(&self, metadata: &InkMetadata, call: &ContractCall, diagnostics: &dyn Diagnostics) -> Option<Arc<DecodedMessage>> {
        let key = (metadata.name().to_string(), call.payload.clone());
        self.last_message.get_or_insert_with(&key, || match metadata.decode_message(&call.payload) {
            Ok(Some(decoded)) => Some(decoded),
            Ok(None) => {
                diagnostics.emit(
                    DiagnosticKind::ArgDecodeFailed,
                    &format!("No message with selector {} in '{}', data kept as raw hex", call.call.selector, metadata.name()),
                );
                None
            }
            Err(e) => {
                diagnostics.emit(
                    DiagnosticKind::ArgDecodeFailed,
                    &format!("Unable to parse call arguments, will be omitted from result: {e}"),
                );
                None
            }
        })
    }

    fn selector_of(&self, metadata: &InkMetadata, method: &str) -> Option<String> {
        self.selectors
            .get_or_resolve(metadata.name(), method, || metadata.selector_of(method))
    }

    fn matches(&self, ctx: &HandlerContext<'_>, filter: &WasmCallFilter, input: &SubstrateCall) -> Result<bool, SieveError> {
        let extracted = self.adapter.extract_call(input, ctx.diagnostics)?;
        let call = &extracted.call;

        if let Some(contract) = ctx.ds.options.wasm_contract() {
            if !same_account(contract, &call.dest) {
                return Ok(false);
            }
        }
        if let Some(from) = filter.from.as_deref() {
            if !same_account(from, &call.from) {
                return Ok(false);
            }
        }
        if let Some(selector) = filter.selector.as_deref() {
            if !selector.eq_ignore_ascii_case(&call.selector) {
                return Ok(false);
            }
        }
        if let Some(method) = filter.method.as_deref() {
            let resolved = metadata_for(&self.metadata, ctx, "call").and_then(|m| self.selector_of(&m, method));
            match resolved {
                Some(selector) if selector.eq_ignore_ascii_case(&call.selector) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

impl HandlerProcessor for WasmCallProcessor {
    type Filter = WasmCallFilter;
    type Input = SubstrateCall;
    type Output = WasmCall;

    fn kind(&self) -> &'static str {
        self.adapter.flavor().call_handler_kind()
    }

    fn filter_validator(&self, raw: Option<&Value>) -> Result<WasmCallFilter, SieveError> {
        WASM_CALL_FILTER_SHAPE.parse(raw)
    }

    fn filter_processor(&self, ctx: &HandlerContext<'_>, filter: &WasmCallFilter, input: &SubstrateCall) -> bool {
        degrade_to_no_match(self.matches(ctx, filter, input), ctx.diagnostics)
    }

    /// Data falls back to the raw payload hex when the message cannot be
    /// decoded; the selector is kept either way.
    fn transformer(
        &self,
        ctx: &HandlerContext<'_>,
        _filter: &WasmCallFilter,
        input: &SubstrateCall,
    ) -> Result<Vec<WasmCall>, SieveError> {
        let extracted = self.adapter.extract_call(input, ctx.diagnostics)?;
        let decoded = metadata_for(&self.metadata, ctx, "call")
            .and_then(|metadata| self.decode(&metadata, &extracted, ctx.diagnostics));

        let mut call = extracted.call;
        call.data = match decoded {
            Some(message) => WasmCallData::Decoded {
                message: message.label.clone(),
                args: message.args.clone(),
            },
            None => WasmCallData::Raw(encode_hex(&extracted.payload)),
        };
        Ok(vec![call])
    }

    fn dictionary_query(&self, ctx: &HandlerContext<'_>, filter: &WasmCallFilter) -> Option<QuerySpec> {
        let input = CallQueryInput {
            target: ctx.ds.options.wasm_contract(),
            from: filter.from.as_deref(),
            selector: filter.selector.as_deref(),
            method: filter.method.as_deref(),
        };
        let metadata = input.method.and_then(|_| query_metadata(&self.metadata, ctx));
        Some(build_call_query(
            WASM_CALL_LAYOUT,
            input,
            |method| metadata.as_deref().and_then(|m| self.selector_of(m, method)),
            ctx.diagnostics,
        ))
    }
}

// ─── Plugin ──────────────────────────────────────────────────────────────────

/// `substrate/Wasm` datasource plugin.
pub struct WasmPlugin {
    event: WasmEventProcessor,
    call: WasmCallProcessor,
    metadata: Arc<MetadataCache>,
}

impl WasmPlugin {
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MetadataCache::new()))
    }

    pub fn with_cache(metadata: Arc<MetadataCache>) -> Self {
        let adapter = Arc::new(WasmAdapter::new());
        Self {
            event: WasmEventProcessor::new(adapter.clone(), metadata.clone()),
            call: WasmCallProcessor::new(adapter, metadata.clone()),
            metadata,
        }
    }

    pub fn event_processor(&self) -> &WasmEventProcessor {
        &self.event
    }

    pub fn call_processor(&self) -> &WasmCallProcessor {
        &self.call
    }

    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }
}

impl Default for WasmPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasourcePlugin for WasmPlugin {
    fn kind(&self) -> &'static str {
        Flavor::Wasm.datasource_kind()
    }

    fn validate(&self, ds: &Datasource, assets: &AssetMap) -> Result<(), SieveError> {
        ds.options.validate(Flavor::Wasm.option_keys())?;
        // Parses and caches the metadata for later dictionary queries
        self.metadata.for_datasource(&ds.options, assets)?;
        Ok(())
    }

    fn handler(&self, kind: &str) -> Option<&dyn DynHandler> {
        if kind == Flavor::Wasm.event_handler_kind() {
            Some(&self.event)
        } else if kind == Flavor::Wasm.call_handler_kind() {
            Some(&self.call)
        } else {
            None
        }
    }

    fn handler_kinds(&self) -> Vec<&'static str> {
        vec![Flavor::Wasm.event_handler_kind(), Flavor::Wasm.call_handler_kind()]
    }
}
