//! # chainsieve-observability
//!
//! OpenTelemetry metrics and structured logging for ChainSieve.
//!
//! ## Built-in metrics
//! - `chainsieve.records_matched`  counter, tagged with handler kind
//! - `chainsieve.records_rejected` counter, tagged with handler kind
//! - `chainsieve.diagnostics`      counter, tagged with diagnostic kind
//!
//! ## Structured logging
//! Text or JSON logs, with levels configurable per component.

pub mod diagnostics;
pub mod metrics;
pub mod tracing_setup;

pub use diagnostics::MeteredDiagnostics;
pub use metrics::SieveMetrics;
pub use tracing_setup::{init_tracing, LogConfig};
