//! # chainsieve-core
//!
//! Canonical log and call records, the filter engine, dictionary query
//! synthesis and the traits every chain flavor implements.
//!
//! Flavor crates (`chainsieve-evm`, `chainsieve-cosmos`, `chainsieve-wasm`)
//! build `ChainAdapter`s and `HandlerProcessor`s on top of the types here.

pub mod adapter;
pub mod cache;
pub mod call;
pub mod datasource;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod hexutil;
pub mod log;
pub mod options;
pub mod processor;
pub mod query;
pub mod raw;
pub mod registry;
pub mod signature;
pub mod types;

pub use adapter::{ChainAdapter, ExecutionOutcome, Flavor};
pub use cache::{InterfaceCache, LabelMemo, SingleSlot};
pub use call::{AccessListItem, NormalizedCall, TxEnvelope, TxSignature};
pub use datasource::{AssetMap, Datasource, HandlerSpec};
pub use diagnostics::{CollectingDiagnostics, Diagnostic, DiagnosticKind, Diagnostics, TracingDiagnostics};
pub use error::{FilterViolation, SieveError};
pub use filter::{CallFilter, LogFilter};
pub use log::{LogEnvelope, NormalizedLog, RawLog};
pub use options::{AddressFilter, DatasourceOptions, OptionKeys};
pub use processor::{DatasourcePlugin, DynHandler, HandlerContext, HandlerProcessor};
pub use query::{QueryCondition, QuerySpec};
pub use registry::PluginRegistry;
pub use signature::{event_signature_to_topic, function_signature_to_selector};
pub use types::{DecodedArgs, NormalizedValue};
