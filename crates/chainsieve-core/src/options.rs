//! Datasource processor options.

use serde::{Deserialize, Serialize};

use crate::error::{FilterViolation, SieveError};
use crate::hexutil::is_evm_address;

/// Options attached to a datasource's processor.
///
/// Which keys are meaningful depends on the flavor: EVM flavors use
/// `address` (and optionally `contractCreation`), the WASM flavor uses
/// `contract`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DatasourceOptions {
    /// Name of the ABI / metadata asset used to decode arguments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<String>,
    /// EVM contract address to filter on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// WASM contract account to filter on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<String>,
    /// Only match contract-creation calls.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub contract_creation: bool,
}

/// Which option keys a flavor accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKeys {
    /// `abi`, `address`, `contractCreation`
    Evm,
    /// `abi`, `contract`
    Wasm,
}

/// Target-address constraint for call filters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressFilter {
    /// No address configured; every call passes.
    Any,
    /// Calls to this contract only. Never matches a contract creation.
    Contract(String),
    /// Contract-creation calls only.
    CreationOnly,
}

impl DatasourceOptions {
    /// Reject keys foreign to the flavor and malformed values, listing every
    /// problem at once.
    pub fn validate(&self, keys: OptionKeys) -> Result<(), SieveError> {
        let mut violations = Vec::new();

        if matches!(self.abi.as_deref(), Some("")) {
            violations.push(FilterViolation::new("abi", "must not be empty"));
        }

        match keys {
            OptionKeys::Evm => {
                if self.contract.is_some() {
                    violations.push(FilterViolation::new("contract", "unknown option for this datasource kind"));
                }
                if let Some(address) = &self.address {
                    if !is_evm_address(address) {
                        violations.push(FilterViolation::new("address", "must be an Ethereum address"));
                    }
                    if self.contract_creation {
                        violations.push(FilterViolation::new(
                            "contractCreation",
                            "cannot be combined with address",
                        ));
                    }
                }
            }
            OptionKeys::Wasm => {
                if self.address.is_some() {
                    violations.push(FilterViolation::new("address", "unknown option for this datasource kind"));
                }
                if self.contract_creation {
                    violations.push(FilterViolation::new(
                        "contractCreation",
                        "unknown option for this datasource kind",
                    ));
                }
                if matches!(self.contract.as_deref(), Some("")) {
                    violations.push(FilterViolation::new("contract", "must not be empty"));
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(SieveError::InvalidOptions { violations })
        }
    }

    /// Call-target constraint for EVM flavors.
    pub fn address_filter(&self) -> AddressFilter {
        match (&self.address, self.contract_creation) {
            (Some(address), _) if !address.is_empty() => AddressFilter::Contract(address.clone()),
            (_, true) => AddressFilter::CreationOnly,
            _ => AddressFilter::Any,
        }
    }

    /// Configured EVM address, if any.
    pub fn evm_address(&self) -> Option<&str> {
        self.address.as_deref().filter(|a| !a.is_empty())
    }

    /// Configured WASM contract, if any.
    pub fn wasm_contract(&self) -> Option<&str> {
        self.contract.as_deref().filter(|c| !c.is_empty())
    }
}
