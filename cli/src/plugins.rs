//! The plugin registry the CLI runs datasources against.

use std::sync::Arc;

use chainsieve_core::PluginRegistry;
use chainsieve_cosmos::{ethermint_plugin_with_cache, JsonTxDataRegistry};
use chainsieve_evm::{AbiCache, AcalaAdapter, EvmPlugin, FrontierAdapter};
use chainsieve_wasm::WasmPlugin;

/// Every supported flavor. The EVM flavors share one ABI cache.
pub fn default_registry() -> PluginRegistry {
    let abis = Arc::new(AbiCache::new());
    PluginRegistry::new()
        .with(Arc::new(EvmPlugin::with_cache(AcalaAdapter::new(), abis.clone())))
        .with(Arc::new(EvmPlugin::with_cache(FrontierAdapter::frontier(), abis.clone())))
        .with(Arc::new(EvmPlugin::with_cache(FrontierAdapter::moonbeam(), abis.clone())))
        .with(Arc::new(ethermint_plugin_with_cache(Arc::new(JsonTxDataRegistry::new()), abis)))
        .with(Arc::new(WasmPlugin::new()))
}
