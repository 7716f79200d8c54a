//! ChainSieve metrics definitions.
//!
//! All metrics use OpenTelemetry conventions and go to whichever meter
//! provider the host installed; without one they are no-ops.

use chainsieve_core::diagnostics::DiagnosticKind;
use opentelemetry::{
    metrics::{Counter, Meter},
    KeyValue,
};

/// Central metrics handle for ChainSieve.
#[derive(Clone)]
pub struct SieveMetrics {
    pub records_matched: Counter<u64>,
    pub records_rejected: Counter<u64>,
    pub diagnostics: Counter<u64>,
}

impl SieveMetrics {
    pub fn new(meter: &Meter) -> Self {
        Self {
            records_matched: meter
                .u64_counter("chainsieve.records_matched")
                .with_description("Records that passed a handler filter")
                .build(),
            records_rejected: meter
                .u64_counter("chainsieve.records_rejected")
                .with_description("Records a handler filter rejected")
                .build(),
            diagnostics: meter
                .u64_counter("chainsieve.diagnostics")
                .with_description("Per-record degradations reported to the diagnostics sink")
                .build(),
        }
    }

    /// Metrics on the global meter provider.
    pub fn global() -> Self {
        Self::new(&opentelemetry::global::meter("chainsieve"))
    }

    /// Count one filter outcome for `handler_kind`.
    pub fn record_filter(&self, handler_kind: &str, matched: bool) {
        let attrs = [KeyValue::new("handler", handler_kind.to_string())];
        if matched {
            self.records_matched.add(1, &attrs);
        } else {
            self.records_rejected.add(1, &attrs);
        }
    }

    pub fn record_diagnostic(&self, kind: DiagnosticKind) {
        self.diagnostics.add(1, &[KeyValue::new("kind", kind.as_str())]);
    }
}
