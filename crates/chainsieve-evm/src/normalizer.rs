//! Converts alloy-core `DynSolValue` → ChainSieve `NormalizedValue`.

use alloy_core::dyn_abi::DynSolValue;
use chainsieve_core::types::NormalizedValue;

/// Convert a decoded `DynSolValue` into a `NormalizedValue`.
pub fn normalize(val: DynSolValue) -> NormalizedValue {
    match val {
        DynSolValue::Bool(b) => NormalizedValue::Bool(b),

        DynSolValue::Int(i, _bits) => match i128::try_from(i) {
            Ok(v) => NormalizedValue::Int(v),
            Err(_) => NormalizedValue::BigInt(i.to_string()),
        },

        DynSolValue::Uint(u, _bits) => match u128::try_from(u) {
            Ok(v) => NormalizedValue::Uint(v),
            Err(_) => NormalizedValue::BigUint(u.to_string()),
        },

        DynSolValue::FixedBytes(word, size) => NormalizedValue::Bytes(word[..size].to_vec()),

        DynSolValue::Bytes(b) => NormalizedValue::Bytes(b),

        DynSolValue::String(s) => NormalizedValue::Str(s),

        // EIP-55 checksum encoding
        DynSolValue::Address(a) => NormalizedValue::Address(a.to_checksum(None)),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            NormalizedValue::Array(vals.into_iter().map(normalize).collect())
        }

        // Struct components have no names at this level
        DynSolValue::Tuple(fields) => NormalizedValue::Tuple(
            fields
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), normalize(v)))
                .collect(),
        ),

        DynSolValue::Function(f) => NormalizedValue::Bytes(f.to_vec()),
    }
}

/// Argument name, or `arg{i}` for unnamed parameters.
pub fn param_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("arg{index}")
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, I256, U256};

    #[test]
    fn uints_narrow_when_they_fit() {
        assert_eq!(normalize(DynSolValue::Uint(U256::from(42u64), 256)), NormalizedValue::Uint(42));
        let big = U256::MAX;
        assert_eq!(normalize(DynSolValue::Uint(big, 256)), NormalizedValue::BigUint(big.to_string()));
    }

    #[test]
    fn negative_int() {
        let v = normalize(DynSolValue::Int("-5".parse::<I256>().unwrap(), 64));
        assert_eq!(v, NormalizedValue::Int(-5));
    }

    #[test]
    fn address_is_checksummed() {
        let addr: Address = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
        assert_eq!(
            normalize(DynSolValue::Address(addr)),
            NormalizedValue::Address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".into())
        );
    }

    #[test]
    fn fixed_bytes_keep_declared_width() {
        let v = normalize(DynSolValue::FixedBytes(B256::repeat_byte(0xab), 4));
        assert_eq!(v, NormalizedValue::Bytes(vec![0xab; 4]));
    }

    #[test]
    fn unnamed_params_are_positional() {
        assert_eq!(param_name("", 2), "arg2");
        assert_eq!(param_name("to", 0), "to");
    }
}
