//! # chainsieve-cosmos
//!
//! Ethermint flavor: EVM transactions on Cosmos SDK chains.
//!
//! Logs and calls reuse the EVM processors from `chainsieve-evm`; this crate
//! only knows how to read them out of ABCI events and `MsgEthereumTx`
//! messages.

pub mod ethermint;
pub mod raw;
pub mod txdata;

use std::sync::Arc;

use chainsieve_evm::{AbiCache, EvmPlugin};

pub use ethermint::{parse_tx_log, tx_success, EthermintAdapter};
pub use raw::{AbciEvent, Attribute, CosmosBlock, CosmosEvent, CosmosMessage, CosmosTx, MsgEthereumTx};
pub use txdata::{JsonTxDataRegistry, TxData, TxDataKind, TxDataRegistry};

pub type EthermintPlugin = EvmPlugin<EthermintAdapter>;

/// `cosmos/EthermintEvm` datasource plugin using `registry` to unpack
/// transaction data.
pub fn ethermint_plugin(registry: Arc<dyn TxDataRegistry>) -> EthermintPlugin {
    EvmPlugin::new(EthermintAdapter::new(registry))
}

/// Same as [`ethermint_plugin`], sharing an interface cache with other EVM
/// plugins.
pub fn ethermint_plugin_with_cache(registry: Arc<dyn TxDataRegistry>, abis: Arc<AbiCache>) -> EthermintPlugin {
    EvmPlugin::with_cache(EthermintAdapter::new(registry), abis)
}
