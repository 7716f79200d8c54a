//! Canonical EVM call record and the typed transaction envelope.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::types::DecodedArgs;

/// One EIP-2930 access list entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessListItem {
    pub address: String,
    #[serde(default)]
    pub storage_keys: Vec<String>,
}

/// Fee and list fields that depend on the transaction type.
///
/// Exactly one variant is populated per call; the numeric `type` tag is
/// derived from it rather than stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "envelope", rename_all = "lowercase")]
pub enum TxEnvelope {
    Legacy {
        gas_price: U256,
    },
    Eip2930 {
        gas_price: U256,
        access_list: Vec<AccessListItem>,
    },
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        access_list: Vec<AccessListItem>,
    },
    Eip7702 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
        access_list: Vec<AccessListItem>,
        /// Signed authorization tuples, kept as delivered by the node.
        authorization_list: Vec<serde_json::Value>,
    },
}

impl TxEnvelope {
    /// 0 = legacy, 1 = eip2930, 2 = eip1559, 3 = eip7702
    pub fn type_tag(&self) -> u8 {
        match self {
            TxEnvelope::Legacy { .. } => 0,
            TxEnvelope::Eip2930 { .. } => 1,
            TxEnvelope::Eip1559 { .. } => 2,
            TxEnvelope::Eip7702 { .. } => 3,
        }
    }

    pub fn gas_price(&self) -> Option<U256> {
        match self {
            TxEnvelope::Legacy { gas_price } | TxEnvelope::Eip2930 { gas_price, .. } => {
                Some(*gas_price)
            }
            _ => None,
        }
    }

    pub fn max_fee_per_gas(&self) -> Option<U256> {
        match self {
            TxEnvelope::Eip1559 { max_fee_per_gas, .. }
            | TxEnvelope::Eip7702 { max_fee_per_gas, .. } => Some(*max_fee_per_gas),
            _ => None,
        }
    }
}

/// Signature components, absent for flavors that do not expose them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxSignature {
    pub r: Option<String>,
    pub s: Option<String>,
    pub v: Option<u64>,
}

/// A decoded contract invocation in canonical form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedCall {
    pub from: String,
    /// `None` exactly for contract creation
    pub to: Option<String>,
    pub nonce: u64,
    /// 0x-prefixed call input
    pub data: String,
    pub value: U256,
    pub hash: String,
    pub block_number: u64,
    pub block_hash: Option<String>,
    /// Unix seconds
    pub timestamp: i64,
    pub success: bool,
    /// -1 when the envelope does not carry one
    pub chain_id: i64,
    pub gas_limit: U256,
    #[serde(flatten)]
    pub envelope: TxEnvelope,
    #[serde(flatten)]
    pub signature: TxSignature,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<DecodedArgs>,
}

impl NormalizedCall {
    pub fn type_tag(&self) -> u8 {
        self.envelope.type_tag()
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_none()
    }

    /// First four bytes of `data`, if present.
    pub fn selector(&self) -> Option<&str> {
        if self.data.len() >= 10 {
            self.data.get(..10)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(envelope: TxEnvelope) -> NormalizedCall {
        NormalizedCall {
            from: "0x01".into(),
            to: None,
            nonce: 0,
            data: "0x40c10f19aabb".into(),
            value: U256::ZERO,
            hash: "0xaa".into(),
            block_number: 1,
            block_hash: None,
            timestamp: 0,
            success: true,
            chain_id: -1,
            gas_limit: U256::from(21_000u64),
            envelope,
            signature: TxSignature::default(),
            args: None,
        }
    }

    #[test]
    fn type_tag_follows_variant() {
        assert_eq!(call(TxEnvelope::Legacy { gas_price: U256::ZERO }).type_tag(), 0);
        let eip1559 = TxEnvelope::Eip1559 {
            max_fee_per_gas: U256::from(2u64),
            max_priority_fee_per_gas: U256::from(1u64),
            access_list: vec![],
        };
        assert_eq!(eip1559.type_tag(), 2);
        assert_eq!(eip1559.gas_price(), None);
        assert_eq!(eip1559.max_fee_per_gas(), Some(U256::from(2u64)));
    }

    #[test]
    fn selector_and_creation() {
        let c = call(TxEnvelope::Legacy { gas_price: U256::ZERO });
        assert_eq!(c.selector(), Some("0x40c10f19"));
        assert!(c.is_contract_creation());
    }
}
