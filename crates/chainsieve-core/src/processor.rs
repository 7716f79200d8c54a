//! Handler processors and datasource plugins: the entry points the indexer
//! host calls.
//!
//! `HandlerProcessor` is the typed interface each flavor implements per
//! handler kind. `DynHandler` is its object-safe JSON-in/JSON-out form,
//! provided for every processor by a blanket impl, so plugins can be stored
//! as trait objects in a `PluginRegistry`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::datasource::{AssetMap, Datasource};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::SieveError;
use crate::query::QuerySpec;

/// Everything a processor sees besides the filter and the record.
#[derive(Clone, Copy)]
pub struct HandlerContext<'a> {
    pub ds: &'a Datasource,
    pub assets: &'a AssetMap,
    pub diagnostics: &'a dyn Diagnostics,
}

impl<'a> HandlerContext<'a> {
    pub fn new(ds: &'a Datasource, assets: &'a AssetMap, diagnostics: &'a dyn Diagnostics) -> Self {
        Self {
            ds,
            assets,
            diagnostics,
        }
    }
}

/// Typed processor for one handler kind.
pub trait HandlerProcessor: Send + Sync {
    type Filter: DeserializeOwned + Default + Send + Sync;
    type Input: DeserializeOwned + Send + Sync;
    type Output: Serialize;

    /// Handler kind string, e.g. `substrate/FrontierEvmCall`.
    fn kind(&self) -> &'static str;

    /// Validate a raw filter and parse it. Runs once at registration.
    fn filter_validator(&self, raw: Option<&Value>) -> Result<Self::Filter, SieveError>;

    /// Whether `input` passes the datasource options and `filter`.
    ///
    /// Never fails: a record that cannot be evaluated is reported to the
    /// diagnostics sink and treated as not matching.
    fn filter_processor(&self, ctx: &HandlerContext<'_>, filter: &Self::Filter, input: &Self::Input) -> bool;

    /// Canonical records for `input`. Exactly one for most handlers, any
    /// number for packed-log flavors.
    fn transformer(
        &self,
        ctx: &HandlerContext<'_>,
        filter: &Self::Filter,
        input: &Self::Input,
    ) -> Result<Vec<Self::Output>, SieveError>;

    /// Conditions for the external dictionary, or `None` when the handler
    /// cannot narrow the search.
    fn dictionary_query(&self, ctx: &HandlerContext<'_>, filter: &Self::Filter) -> Option<QuerySpec>;
}

/// Report a per-record evaluation failure and treat it as "no match".
pub fn degrade_to_no_match(result: Result<bool, SieveError>, diagnostics: &dyn Diagnostics) -> bool {
    match result {
        Ok(matched) => matched,
        Err(e) => {
            diagnostics.emit(DiagnosticKind::FilterEvaluationFailed, &e.to_string());
            false
        }
    }
}

// ─── Object-safe form ────────────────────────────────────────────────────────

/// JSON-level view of a `HandlerProcessor`.
pub trait DynHandler: Send + Sync {
    fn kind(&self) -> &'static str;

    fn validate_filter(&self, raw: Option<&Value>) -> Result<(), SieveError>;

    fn filter(&self, ctx: &HandlerContext<'_>, raw_filter: Option<&Value>, input: &Value) -> Result<bool, SieveError>;

    fn transform(
        &self,
        ctx: &HandlerContext<'_>,
        raw_filter: Option<&Value>,
        input: &Value,
    ) -> Result<Vec<Value>, SieveError>;

    fn query(&self, ctx: &HandlerContext<'_>, raw_filter: Option<&Value>) -> Result<Option<QuerySpec>, SieveError>;
}

fn parse_input<T: DeserializeOwned>(kind: &str, input: &Value) -> Result<T, SieveError> {
    serde_json::from_value(input.clone()).map_err(|e| SieveError::raw_input(format!("{kind} input: {e}")))
}

impl<P: HandlerProcessor> DynHandler for P {
    fn kind(&self) -> &'static str {
        HandlerProcessor::kind(self)
    }

    fn validate_filter(&self, raw: Option<&Value>) -> Result<(), SieveError> {
        self.filter_validator(raw).map(|_| ())
    }

    fn filter(&self, ctx: &HandlerContext<'_>, raw_filter: Option<&Value>, input: &Value) -> Result<bool, SieveError> {
        let filter = self.filter_validator(raw_filter)?;
        let input: P::Input = parse_input(HandlerProcessor::kind(self), input)?;
        Ok(self.filter_processor(ctx, &filter, &input))
    }

    fn transform(
        &self,
        ctx: &HandlerContext<'_>,
        raw_filter: Option<&Value>,
        input: &Value,
    ) -> Result<Vec<Value>, SieveError> {
        let filter = self.filter_validator(raw_filter)?;
        let input: P::Input = parse_input(HandlerProcessor::kind(self), input)?;
        self.transformer(ctx, &filter, &input)?
            .iter()
            .map(|record| serde_json::to_value(record).map_err(SieveError::from))
            .collect()
    }

    fn query(&self, ctx: &HandlerContext<'_>, raw_filter: Option<&Value>) -> Result<Option<QuerySpec>, SieveError> {
        let filter = self.filter_validator(raw_filter)?;
        Ok(self.dictionary_query(ctx, &filter))
    }
}

// ─── Datasource plugin ───────────────────────────────────────────────────────

/// One datasource kind and its handlers.
pub trait DatasourcePlugin: Send + Sync {
    /// Datasource kind string, e.g. `substrate/AcalaEvm`.
    fn kind(&self) -> &'static str;

    /// Check options and build the ABI interface eagerly so a malformed
    /// document fails registration rather than a later block.
    fn validate(&self, ds: &Datasource, assets: &AssetMap) -> Result<(), SieveError>;

    fn handler(&self, kind: &str) -> Option<&dyn DynHandler>;

    fn handler_kinds(&self) -> Vec<&'static str>;

    /// Whether this plugin owns `ds`.
    fn ds_filter_processor(&self, ds: &Datasource) -> bool {
        ds.kind == self.kind()
    }

    /// Full registration check: options, ABI and every handler filter.
    fn validate_datasource(&self, ds: &Datasource, assets: &AssetMap) -> Result<(), SieveError> {
        self.validate(ds, assets)?;
        for spec in &ds.handlers {
            let handler = self.handler(&spec.kind).ok_or_else(|| SieveError::UnknownKind {
                what: "handler",
                kind: spec.kind.clone(),
            })?;
            handler.validate_filter(spec.filter.as_ref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::CollectingDiagnostics;
    use crate::options::DatasourceOptions;
    use serde_json::json;

    /// Matches even numbers at or above `min`.
    struct EvenProcessor;

    #[derive(Debug, Default, serde::Deserialize)]
    struct MinFilter {
        #[serde(default)]
        min: u64,
    }

    impl HandlerProcessor for EvenProcessor {
        type Filter = MinFilter;
        type Input = u64;
        type Output = u64;

        fn kind(&self) -> &'static str {
            "test/Even"
        }

        fn filter_validator(&self, raw: Option<&Value>) -> Result<MinFilter, SieveError> {
            match raw {
                None => Ok(MinFilter::default()),
                Some(v) => Ok(MinFilter::deserialize(v)?),
            }
        }

        fn filter_processor(&self, ctx: &HandlerContext<'_>, filter: &MinFilter, input: &u64) -> bool {
            let result = if *input == 13 {
                Err(SieveError::raw_input("unlucky"))
            } else {
                Ok(*input % 2 == 0 && *input >= filter.min)
            };
            degrade_to_no_match(result, ctx.diagnostics)
        }

        fn transformer(&self, _ctx: &HandlerContext<'_>, _filter: &MinFilter, input: &u64) -> Result<Vec<u64>, SieveError> {
            Ok(vec![*input, *input / 2])
        }

        fn dictionary_query(&self, _ctx: &HandlerContext<'_>, _filter: &MinFilter) -> Option<QuerySpec> {
            None
        }
    }

    use serde::Deserialize;

    #[test]
    fn dyn_handler_round_trips_json() {
        let ds = Datasource::new("test", DatasourceOptions::default());
        let assets = AssetMap::new();
        let diag = CollectingDiagnostics::new();
        let ctx = HandlerContext::new(&ds, &assets, &diag);
        let handler: &dyn DynHandler = &EvenProcessor;

        let filter = json!({"min": 4});
        assert!(handler.filter(&ctx, Some(&filter), &json!(6)).unwrap());
        assert!(!handler.filter(&ctx, Some(&filter), &json!(2)).unwrap());
        assert_eq!(handler.transform(&ctx, None, &json!(6)).unwrap(), vec![json!(6), json!(3)]);
        assert!(matches!(
            handler.filter(&ctx, None, &json!("six")),
            Err(SieveError::InvalidRawInput { .. })
        ));
    }

    #[test]
    fn evaluation_failure_is_a_diagnostic() {
        let ds = Datasource::new("test", DatasourceOptions::default());
        let assets = AssetMap::new();
        let diag = CollectingDiagnostics::new();
        let ctx = HandlerContext::new(&ds, &assets, &diag);

        assert!(!EvenProcessor.filter_processor(&ctx, &MinFilter::default(), &13));
        assert_eq!(diag.count(DiagnosticKind::FilterEvaluationFailed), 1);
    }
}
