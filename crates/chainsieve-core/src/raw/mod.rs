//! Raw inputs handed over by the indexer host.
//!
//! These are the JSON shapes a node client produces after fetching a block;
//! fetching itself is not part of this crate.

pub mod substrate;
pub mod value;

pub use substrate::{EventRecord, SubstrateBlock, SubstrateCall, SubstrateEvent, SubstrateExtrinsic};
