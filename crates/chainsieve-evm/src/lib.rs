//! # chainsieve-evm
//!
//! EVM-on-Substrate flavors: Acala EVM+, Frontier and Moonbeam.
//!
//! ## Implementation notes
//! - Uses `alloy-core` for ABI decode and `alloy-json-abi` for interfaces
//! - Acala packs all logs of a transaction into its outcome event; Frontier
//!   emits one `evm.Log` per log
//! - Call sender, target and status come from the execution outcome event,
//!   never from the extrinsic signer

pub mod abi;
pub mod acala;
pub mod ethjson;
pub mod frontier;
pub mod normalizer;
pub mod processor;

pub use abi::{AbiCache, AbiInterface};
pub use acala::AcalaAdapter;
pub use frontier::FrontierAdapter;
pub use processor::{EvmAdapter, EvmCallProcessor, EvmEventProcessor, EvmPlugin};

pub type AcalaPlugin = EvmPlugin<AcalaAdapter>;
pub type FrontierPlugin = EvmPlugin<FrontierAdapter>;

/// `substrate/AcalaEvm` datasource plugin.
pub fn acala_plugin() -> AcalaPlugin {
    EvmPlugin::new(AcalaAdapter::new())
}

/// `substrate/FrontierEvm` datasource plugin.
pub fn frontier_plugin() -> FrontierPlugin {
    EvmPlugin::new(FrontierAdapter::frontier())
}

/// `substrate/Moonbeam` datasource plugin.
pub fn moonbeam_plugin() -> FrontierPlugin {
    EvmPlugin::new(FrontierAdapter::moonbeam())
}
