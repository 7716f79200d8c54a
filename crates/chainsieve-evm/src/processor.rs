//! Event and call processors shared by every EVM flavor.
//!
//! The processors are generic over an `EvmAdapter`; the flavor only decides
//! how logs, calls and outcomes are read from the raw input.

use std::sync::Arc;

use chainsieve_core::adapter::{ChainAdapter, Flavor};
use chainsieve_core::call::NormalizedCall;
use chainsieve_core::datasource::{AssetMap, Datasource};
use chainsieve_core::diagnostics::{DiagnosticKind, Diagnostics};
use chainsieve_core::error::SieveError;
use chainsieve_core::filter::{
    evaluate_call_filter, log_matches, CallFilter, LogFilter, CALL_FILTER_SHAPE, LOG_FILTER_SHAPE,
};
use chainsieve_core::log::{LogEnvelope, NormalizedLog, RawLog};
use chainsieve_core::processor::{degrade_to_no_match, DatasourcePlugin, DynHandler, HandlerContext, HandlerProcessor};
use chainsieve_core::query::{build_call_query, build_log_query, CallQueryInput, QuerySpec, EVM_CALL_LAYOUT};
use chainsieve_core::signature::function_signature_to_selector;
use chainsieve_core::types::DecodedArgs;

use crate::abi::{AbiCache, AbiInterface};

/// A `ChainAdapter` producing EVM logs and calls.
pub trait EvmAdapter: ChainAdapter<Candidate = RawLog, Call = NormalizedCall> {
    /// Block and transaction context shared by the logs of `input`.
    fn log_envelope(&self, input: &Self::EventInput, diagnostics: &dyn Diagnostics) -> LogEnvelope;

    /// `true` when one event can carry several logs, in which case the
    /// transformer filters them individually.
    fn packs_logs(&self) -> bool {
        false
    }
}

/// Resolve the datasource ABI and decode with it, reporting failures as
/// diagnostics. No ABI configured means no arguments.
fn decode_args<F>(abis: &AbiCache, ctx: &HandlerContext<'_>, what: &str, decode: F) -> Option<DecodedArgs>
where
    F: FnOnce(&AbiInterface) -> Result<Option<DecodedArgs>, SieveError>,
{
    let result = abis
        .for_datasource(&ctx.ds.options, ctx.assets)
        .and_then(|iface| match iface {
            Some(iface) => decode(&iface),
            None => Ok(None),
        });
    match result {
        Ok(args) => args,
        Err(e) => {
            ctx.diagnostics.emit(
                DiagnosticKind::ArgDecodeFailed,
                &format!("Unable to parse {what} arguments, will be omitted from result: {e}"),
            );
            None
        }
    }
}

// ─── Events ──────────────────────────────────────────────────────────────────

pub struct EvmEventProcessor<A> {
    adapter: Arc<A>,
    abis: Arc<AbiCache>,
}

impl<A: EvmAdapter> EvmEventProcessor<A> {
    pub fn new(adapter: Arc<A>, abis: Arc<AbiCache>) -> Self {
        Self { adapter, abis }
    }

    /// Extracted logs minus malformed ones, which are reported and skipped
    /// so the rest of a packed event still goes through.
    fn well_formed_logs(&self, ctx: &HandlerContext<'_>, input: &A::EventInput) -> Result<Vec<RawLog>, SieveError> {
        let mut logs = self.adapter.extract_logs(input)?;
        logs.retain(|log| match log.check_topics() {
            Ok(()) => true,
            Err(e) => {
                ctx.diagnostics.emit(DiagnosticKind::MalformedInput, &e.to_string());
                false
            }
        });
        Ok(logs)
    }

    fn matching_logs(&self, ctx: &HandlerContext<'_>, filter: &LogFilter, input: &A::EventInput) -> Result<Vec<RawLog>, SieveError> {
        let address = ctx.ds.options.evm_address();
        let mut out = Vec::new();
        for log in self.well_formed_logs(ctx, input)? {
            if log_matches(address, Some(filter), &log)? {
                out.push(log);
            }
        }
        Ok(out)
    }
}

impl<A: EvmAdapter> HandlerProcessor for EvmEventProcessor<A> {
    type Filter = LogFilter;
    type Input = A::EventInput;
    type Output = NormalizedLog;

    fn kind(&self) -> &'static str {
        self.adapter.flavor().event_handler_kind()
    }

    fn filter_validator(&self, raw: Option<&serde_json::Value>) -> Result<LogFilter, SieveError> {
        LOG_FILTER_SHAPE.parse(raw)
    }

    fn filter_processor(&self, ctx: &HandlerContext<'_>, filter: &LogFilter, input: &A::EventInput) -> bool {
        degrade_to_no_match(
            self.matching_logs(ctx, filter, input).map(|logs| !logs.is_empty()),
            ctx.diagnostics,
        )
    }

    fn transformer(
        &self,
        ctx: &HandlerContext<'_>,
        filter: &LogFilter,
        input: &A::EventInput,
    ) -> Result<Vec<NormalizedLog>, SieveError> {
        let logs = if self.adapter.packs_logs() {
            self.matching_logs(ctx, filter, input)?
        } else {
            self.well_formed_logs(ctx, input)?
        };
        let envelope = self.adapter.log_envelope(input, ctx.diagnostics);

        let records = logs
            .into_iter()
            .enumerate()
            .map(|(position, raw)| {
                let mut log = NormalizedLog::assemble(raw, &envelope, position)?;
                let view = log.raw();
                log.args = decode_args(&self.abis, ctx, "log", |iface| iface.decode_log_args(&view));
                Ok(log)
            })
            .collect::<Result<Vec<_>, SieveError>>()?;

        tracing::trace!(kind = HandlerProcessor::kind(self), records = records.len(), "transformed event");
        Ok(records)
    }

    fn dictionary_query(&self, ctx: &HandlerContext<'_>, filter: &LogFilter) -> Option<QuerySpec> {
        match build_log_query(Some(filter), &ctx.ds.options) {
            Ok(query) => query,
            Err(e) => {
                ctx.diagnostics.emit(DiagnosticKind::QueryConditionDropped, &e.to_string());
                None
            }
        }
    }
}

// ─── Calls ───────────────────────────────────────────────────────────────────

pub struct EvmCallProcessor<A> {
    adapter: Arc<A>,
    abis: Arc<AbiCache>,
}

impl<A: EvmAdapter> EvmCallProcessor<A> {
    pub fn new(adapter: Arc<A>, abis: Arc<AbiCache>) -> Self {
        Self { adapter, abis }
    }
}

impl<A: EvmAdapter> HandlerProcessor for EvmCallProcessor<A> {
    type Filter = CallFilter;
    type Input = A::CallInput;
    type Output = NormalizedCall;

    fn kind(&self) -> &'static str {
        self.adapter.flavor().call_handler_kind()
    }

    fn filter_validator(&self, raw: Option<&serde_json::Value>) -> Result<CallFilter, SieveError> {
        CALL_FILTER_SHAPE.parse(raw)
    }

    /// A call without its outcome event never matches.
    fn filter_processor(&self, ctx: &HandlerContext<'_>, filter: &CallFilter, input: &A::CallInput) -> bool {
        let result = self
            .adapter
            .extract_outcome(input)
            .and_then(|_| self.adapter.extract_call(input, ctx.diagnostics))
            .and_then(|call| evaluate_call_filter(Some(filter), &ctx.ds.options.address_filter(), &call));
        degrade_to_no_match(result, ctx.diagnostics)
    }

    fn transformer(
        &self,
        ctx: &HandlerContext<'_>,
        _filter: &CallFilter,
        input: &A::CallInput,
    ) -> Result<Vec<NormalizedCall>, SieveError> {
        let mut call = self.adapter.extract_call(input, ctx.diagnostics)?;
        let data = call.data.clone();
        call.args = decode_args(&self.abis, ctx, "call", |iface| iface.decode_call_args(&data));
        Ok(vec![call])
    }

    fn dictionary_query(&self, ctx: &HandlerContext<'_>, filter: &CallFilter) -> Option<QuerySpec> {
        let input = CallQueryInput {
            target: ctx.ds.options.evm_address(),
            from: filter.from.as_deref(),
            selector: filter.selector.as_deref(),
            method: filter.function.as_deref(),
        };
        Some(build_call_query(
            EVM_CALL_LAYOUT,
            input,
            |m| function_signature_to_selector(m).ok(),
            ctx.diagnostics,
        ))
    }
}

// ─── Plugin ──────────────────────────────────────────────────────────────────

/// Datasource plugin for one EVM flavor.
pub struct EvmPlugin<A> {
    flavor: Flavor,
    event: EvmEventProcessor<A>,
    call: EvmCallProcessor<A>,
    abis: Arc<AbiCache>,
}

impl<A: EvmAdapter> EvmPlugin<A> {
    pub fn new(adapter: A) -> Self {
        Self::with_cache(adapter, Arc::new(AbiCache::new()))
    }

    /// Share one interface cache between several plugins.
    pub fn with_cache(adapter: A, abis: Arc<AbiCache>) -> Self {
        let flavor = adapter.flavor();
        let adapter = Arc::new(adapter);
        Self {
            flavor,
            event: EvmEventProcessor::new(adapter.clone(), abis.clone()),
            call: EvmCallProcessor::new(adapter, abis.clone()),
            abis,
        }
    }

    pub fn event_processor(&self) -> &EvmEventProcessor<A> {
        &self.event
    }

    pub fn call_processor(&self) -> &EvmCallProcessor<A> {
        &self.call
    }
}

impl<A: EvmAdapter + 'static> DatasourcePlugin for EvmPlugin<A> {
    fn kind(&self) -> &'static str {
        self.flavor.datasource_kind()
    }

    fn validate(&self, ds: &Datasource, assets: &AssetMap) -> Result<(), SieveError> {
        ds.options.validate(self.flavor.option_keys())?;
        // Builds and caches the interface; a malformed ABI fails here
        self.abis.for_datasource(&ds.options, assets)?;
        Ok(())
    }

    fn handler(&self, kind: &str) -> Option<&dyn DynHandler> {
        if kind == self.flavor.event_handler_kind() {
            Some(&self.event)
        } else if kind == self.flavor.call_handler_kind() {
            Some(&self.call)
        } else {
            None
        }
    }

    fn handler_kinds(&self) -> Vec<&'static str> {
        vec![self.flavor.event_handler_kind(), self.flavor.call_handler_kind()]
    }
}
