//! The `ChainAdapter` trait: one implementation per chain flavor.
//!
//! An adapter knows how a flavor encodes logs, calls and their execution
//! outcome, and turns raw host inputs into candidates the shared filter
//! engine can evaluate. Adapters never filter and never decode arguments;
//! processors do both on top of them.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::diagnostics::Diagnostics;
use crate::error::SieveError;
use crate::options::OptionKeys;

/// Sender, target and status of an executed transaction, read from the
/// companion event a flavor emits next to the call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub from: String,
    /// `None` for contract creation
    pub to: Option<String>,
    /// Transaction hash, when the outcome event carries one
    pub hash: Option<String>,
    pub success: bool,
}

/// The supported chain encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flavor {
    AcalaEvm,
    FrontierEvm,
    /// Frontier encoding under Moonbeam's own datasource kinds.
    MoonbeamEvm,
    EthermintEvm,
    Wasm,
}

impl Flavor {
    pub const ALL: [Flavor; 5] = [
        Flavor::AcalaEvm,
        Flavor::FrontierEvm,
        Flavor::MoonbeamEvm,
        Flavor::EthermintEvm,
        Flavor::Wasm,
    ];

    /// Datasource kind string as written in manifests.
    pub fn datasource_kind(&self) -> &'static str {
        match self {
            Flavor::AcalaEvm => "substrate/AcalaEvm",
            Flavor::FrontierEvm => "substrate/FrontierEvm",
            Flavor::MoonbeamEvm => "substrate/Moonbeam",
            Flavor::EthermintEvm => "cosmos/EthermintEvm",
            Flavor::Wasm => "substrate/Wasm",
        }
    }

    pub fn event_handler_kind(&self) -> &'static str {
        match self {
            Flavor::AcalaEvm => "substrate/AcalaEvmEvent",
            Flavor::FrontierEvm => "substrate/FrontierEvmEvent",
            Flavor::MoonbeamEvm => "substrate/MoonbeamEvent",
            Flavor::EthermintEvm => "cosmos/EthermintEvmEvent",
            Flavor::Wasm => "substrate/WasmEvent",
        }
    }

    pub fn call_handler_kind(&self) -> &'static str {
        match self {
            Flavor::AcalaEvm => "substrate/AcalaEvmCall",
            Flavor::FrontierEvm => "substrate/FrontierEvmCall",
            Flavor::MoonbeamEvm => "substrate/MoonbeamCall",
            Flavor::EthermintEvm => "cosmos/EthermintEvmCall",
            Flavor::Wasm => "substrate/WasmCall",
        }
    }

    /// Processor option keys accepted by this flavor.
    pub fn option_keys(&self) -> OptionKeys {
        match self {
            Flavor::Wasm => OptionKeys::Wasm,
            _ => OptionKeys::Evm,
        }
    }

    pub fn from_datasource_kind(kind: &str) -> Option<Flavor> {
        Self::ALL.into_iter().find(|f| f.datasource_kind() == kind)
    }
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.datasource_kind())
    }
}

/// Flavor-specific extraction of logs, calls and execution outcomes.
///
/// # Thread Safety
/// Adapters are shared by every handler of a plugin and may be called from
/// several host workers at once; implementations hold no per-record state.
pub trait ChainAdapter: Send + Sync {
    /// Raw input of an event handler.
    type EventInput: DeserializeOwned + Send + Sync;
    /// Raw input of a call handler.
    type CallInput: DeserializeOwned + Send + Sync;
    /// What one event input yields before filtering.
    type Candidate: Clone + Send + Sync;
    /// What one call input yields before argument decoding.
    type Call: Clone + Send + Sync;

    fn flavor(&self) -> Flavor;

    /// Find the companion outcome event among the call's siblings.
    ///
    /// Fails with `ExecutionEventMissing` when none is present, e.g. for
    /// calls wrapped in a batch that suppresses the event.
    fn extract_outcome(&self, input: &Self::CallInput) -> Result<ExecutionOutcome, SieveError>;

    /// Every log candidate carried by one event. Most flavors yield one,
    /// packed flavors may yield any number.
    fn extract_logs(&self, input: &Self::EventInput) -> Result<Vec<Self::Candidate>, SieveError>;

    /// The call envelope. A missing outcome degrades the call to
    /// `success = false` and is reported to `diagnostics`.
    fn extract_call(
        &self,
        input: &Self::CallInput,
        diagnostics: &dyn Diagnostics,
    ) -> Result<Self::Call, SieveError>;
}
