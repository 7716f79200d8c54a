//! A diagnostics sink that counts what it forwards.

use chainsieve_core::diagnostics::{DiagnosticKind, Diagnostics, TracingDiagnostics};

use crate::metrics::SieveMetrics;

/// Forwards every diagnostic to an inner sink and increments
/// `chainsieve.diagnostics` for its kind.
pub struct MeteredDiagnostics<D = TracingDiagnostics> {
    inner: D,
    metrics: SieveMetrics,
}

impl MeteredDiagnostics<TracingDiagnostics> {
    /// Log through `tracing`, count on the global meter.
    pub fn tracing() -> Self {
        Self::new(TracingDiagnostics, SieveMetrics::global())
    }
}

impl<D: Diagnostics> MeteredDiagnostics<D> {
    pub fn new(inner: D, metrics: SieveMetrics) -> Self {
        Self { inner, metrics }
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn metrics(&self) -> &SieveMetrics {
        &self.metrics
    }
}

impl<D: Diagnostics> Diagnostics for MeteredDiagnostics<D> {
    fn emit(&self, kind: DiagnosticKind, message: &str) {
        self.metrics.record_diagnostic(kind);
        self.inner.emit(kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainsieve_core::diagnostics::CollectingDiagnostics;

    #[test]
    fn forwards_to_inner_sink() {
        let diag = MeteredDiagnostics::new(CollectingDiagnostics::new(), SieveMetrics::global());
        diag.emit(DiagnosticKind::ArgDecodeFailed, "bad payload");
        diag.emit(DiagnosticKind::QueryConditionDropped, "unresolved method");
        diag.metrics().record_filter("substrate/WasmCall", true);

        assert_eq!(diag.inner().count(DiagnosticKind::ArgDecodeFailed), 1);
        assert_eq!(diag.inner().entries()[1].message, "unresolved method");
    }
}
