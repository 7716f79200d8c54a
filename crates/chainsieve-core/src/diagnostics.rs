//! Diagnostics sink threaded through every processor entry point.
//!
//! Per-record failures never abort a scan; they are reported here instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

/// What kind of degradation happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Arguments could not be decoded and were omitted.
    ArgDecodeFailed,
    /// The companion outcome event was absent; the record was degraded.
    ExecutionEventMissing,
    /// A filter could not be evaluated against a record; treated as no match.
    FilterEvaluationFailed,
    /// A dictionary query condition was dropped or overridden.
    QueryConditionDropped,
    /// The raw input did not have the expected shape.
    MalformedInput,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::ArgDecodeFailed => "arg_decode_failed",
            DiagnosticKind::ExecutionEventMissing => "execution_event_missing",
            DiagnosticKind::FilterEvaluationFailed => "filter_evaluation_failed",
            DiagnosticKind::QueryConditionDropped => "query_condition_dropped",
            DiagnosticKind::MalformedInput => "malformed_input",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
}

/// Receiver for per-record warnings.
pub trait Diagnostics: Send + Sync {
    fn emit(&self, kind: DiagnosticKind, message: &str);
}

/// Forwards diagnostics to `tracing` at warn level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDiagnostics;

impl Diagnostics for TracingDiagnostics {
    fn emit(&self, kind: DiagnosticKind, message: &str) {
        tracing::warn!(kind = %kind, "{message}");
    }
}

/// Keeps every diagnostic in memory. Used by tests and by the CLI `run`
/// command to print a summary.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<Diagnostic> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|d| d.kind == kind)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_empty()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn emit(&self, kind: DiagnosticKind, message: &str) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Diagnostic {
                kind,
                message: message.to_string(),
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_counts_by_kind() {
        let diag = CollectingDiagnostics::new();
        assert!(diag.is_empty());
        diag.emit(DiagnosticKind::ArgDecodeFailed, "bad data");
        diag.emit(DiagnosticKind::ArgDecodeFailed, "bad data again");
        diag.emit(DiagnosticKind::QueryConditionDropped, "method unknown");

        assert_eq!(diag.count(DiagnosticKind::ArgDecodeFailed), 2);
        assert_eq!(diag.count(DiagnosticKind::ExecutionEventMissing), 0);
        assert_eq!(diag.entries()[2].message, "method unknown");
    }
}
