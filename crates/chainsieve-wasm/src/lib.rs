//! # chainsieve-wasm
//!
//! Substrate `contracts` pallet flavor for ink! contracts.
//!
//! ## Implementation notes
//! - Metadata documents V1 to V4 (and the pre-versioned layout) are parsed
//!   into one `InkMetadata` shape
//! - Arguments are SCALE-decoded with `parity-scale-codec` against the
//!   metadata type registry
//! - Events are identified by their index byte, calls by their 4-byte
//!   selector; labels resolve through the metadata

pub mod adapter;
pub mod metadata;
pub mod processor;
pub mod scale;
pub mod types;

pub use adapter::{ContractCall, ContractEmitted, WasmAdapter};
pub use metadata::{InkMetadata, MetadataCache, MetadataVersion};
pub use processor::{WasmCallProcessor, WasmEventProcessor, WasmPlugin};
pub use types::{WasmCall, WasmCallData, WasmCallFilter, WasmEvent, WasmEventFilter, Weight};

/// `substrate/Wasm` datasource plugin.
pub fn wasm_plugin() -> WasmPlugin {
    WasmPlugin::new()
}
