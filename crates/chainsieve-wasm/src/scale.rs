//! SCALE decoding of ink! values against a metadata type registry.
//!
//! Values are normalized into the same `NormalizedValue` tree the EVM
//! flavors use:
//! - `u8` sequences and arrays become `Bytes` (account ids, hashes)
//! - single-field unnamed composites unwrap to their field
//! - `Option` becomes `Null` or the inner value; other enums become the
//!   variant name, or `{name: fields}` when the variant carries data

use alloy_primitives::{I256, U256};
use parity_scale_codec::{Compact, Decode};

use chainsieve_core::error::SieveError;
use chainsieve_core::types::{DecodedArgs, NormalizedValue};

use crate::metadata::{ArgSpec, Field, Primitive, TypeDef, TypeId, TypeRegistry};

/// Recursive types are legal in the registry; a payload nesting deeper than
/// this is treated as malformed.
const MAX_DEPTH: usize = 64;

fn decode_failed(reason: impl std::fmt::Display) -> SieveError {
    SieveError::ArgDecodeFailed {
        reason: reason.to_string(),
    }
}

fn read<T: Decode>(input: &mut &[u8], what: &str) -> Result<T, SieveError> {
    T::decode(input).map_err(|e| decode_failed(format!("{what}: {e}")))
}

/// Decode `args` in order from `input`, naming each by its label.
pub fn decode_args(registry: &TypeRegistry, args: &[ArgSpec], input: &mut &[u8]) -> Result<DecodedArgs, SieveError> {
    let decoder = Decoder { registry };
    let mut out = Vec::with_capacity(args.len());
    for arg in args {
        let value = decoder
            .value(arg.ty, input, 0)
            .map_err(|e| decode_failed(format!("argument '{}': {e}", arg.label)))?;
        out.push((arg.label.clone(), value));
    }
    Ok(DecodedArgs::new(out))
}

/// Decode one value of type `ty`.
pub fn decode_value(registry: &TypeRegistry, ty: TypeId, input: &mut &[u8]) -> Result<NormalizedValue, SieveError> {
    Decoder { registry }.value(ty, input, 0)
}

struct Decoder<'a> {
    registry: &'a TypeRegistry,
}

impl Decoder<'_> {
    fn value(&self, ty: TypeId, input: &mut &[u8], depth: usize) -> Result<NormalizedValue, SieveError> {
        if depth > MAX_DEPTH {
            return Err(decode_failed(format!("type {ty} nests deeper than {MAX_DEPTH} levels")));
        }
        let info = self.registry.get(ty)?;

        match &info.def {
            TypeDef::Primitive(p) => primitive(*p, input),
            TypeDef::Composite { fields } => self.fields(fields, input, depth),
            TypeDef::Variant { variants } => {
                let index: u8 = read(input, "variant index")?;
                let variant = variants
                    .iter()
                    .enumerate()
                    .find(|(pos, v)| v.index.unwrap_or(*pos as u8) == index)
                    .map(|(_, v)| v)
                    .ok_or_else(|| decode_failed(format!("type {ty} has no variant {index}")))?;

                if info.is_option() {
                    return match variant.fields.first() {
                        None => Ok(NormalizedValue::Null),
                        Some(inner) => self.value(inner.ty, input, depth + 1),
                    };
                }
                if variant.fields.is_empty() {
                    Ok(NormalizedValue::Str(variant.name.clone()))
                } else {
                    let fields = self.fields(&variant.fields, input, depth)?;
                    Ok(NormalizedValue::Tuple(vec![(variant.name.clone(), fields)]))
                }
            }
            TypeDef::Sequence { ty: elem } => {
                let Compact(len) = read::<Compact<u32>>(input, "sequence length")?;
                self.repeat(*elem, len as usize, input, depth)
            }
            TypeDef::Array { len, ty: elem } => self.repeat(*elem, *len as usize, input, depth),
            TypeDef::Tuple(ids) if ids.is_empty() => Ok(NormalizedValue::Null),
            TypeDef::Tuple(ids) => {
                let mut out = Vec::with_capacity(ids.len());
                for (i, id) in ids.iter().enumerate() {
                    out.push((i.to_string(), self.value(*id, input, depth + 1)?));
                }
                Ok(NormalizedValue::Tuple(out))
            }
            TypeDef::Compact { ty: inner } => self.compact(*inner, input, depth + 1),
            TypeDef::BitSequence(_) => Err(decode_failed(format!("type {ty}: bit sequences are not supported"))),
        }
    }

    /// `Compact<T>` for an unsigned integer, a unit type, or a wrapper with
    /// a single compact-encodable field such as `Perbill(u32)`.
    fn compact(&self, ty: TypeId, input: &mut &[u8], depth: usize) -> Result<NormalizedValue, SieveError> {
        if depth > MAX_DEPTH {
            return Err(decode_failed(format!("type {ty} nests deeper than {MAX_DEPTH} levels")));
        }
        match &self.registry.get(ty)?.def {
            TypeDef::Primitive(Primitive::U8 | Primitive::U16 | Primitive::U32 | Primitive::U64 | Primitive::U128) => {
                let Compact(v) = read::<Compact<u128>>(input, "compact")?;
                Ok(NormalizedValue::Uint(v))
            }
            TypeDef::Tuple(ids) if ids.is_empty() => Ok(NormalizedValue::Null),
            TypeDef::Composite { fields } if fields.is_empty() => Ok(NormalizedValue::Null),
            TypeDef::Composite { fields } if fields.len() == 1 => {
                let inner = self.compact(fields[0].ty, input, depth + 1)?;
                Ok(match &fields[0].name {
                    None => inner,
                    Some(name) => NormalizedValue::Tuple(vec![(name.clone(), inner)]),
                })
            }
            TypeDef::Tuple(ids) if ids.len() == 1 => self.compact(ids[0], input, depth + 1),
            _ => Err(decode_failed(format!("type {ty} cannot be compact-encoded"))),
        }
    }

    fn fields(&self, fields: &[Field], input: &mut &[u8], depth: usize) -> Result<NormalizedValue, SieveError> {
        if let [only] = fields {
            if only.name.is_none() {
                return self.value(only.ty, input, depth + 1);
            }
        }
        let mut out = Vec::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            let name = field.name.clone().unwrap_or_else(|| i.to_string());
            out.push((name, self.value(field.ty, input, depth + 1)?));
        }
        Ok(NormalizedValue::Tuple(out))
    }

    fn repeat(&self, elem: TypeId, len: usize, input: &mut &[u8], depth: usize) -> Result<NormalizedValue, SieveError> {
        // Every supported element takes at least one byte except unit types,
        // so a length beyond the remaining input is corrupt
        if len > input.len() {
            return Err(decode_failed(format!(
                "length {len} exceeds the {} remaining bytes",
                input.len()
            )));
        }
        if self.registry.is_byte(elem) {
            let (head, rest) = input.split_at(len);
            *input = rest;
            return Ok(NormalizedValue::Bytes(head.to_vec()));
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(self.value(elem, input, depth + 1)?);
        }
        Ok(NormalizedValue::Array(out))
    }
}

fn primitive(p: Primitive, input: &mut &[u8]) -> Result<NormalizedValue, SieveError> {
    let value = match p {
        Primitive::Bool => NormalizedValue::Bool(read(input, "bool")?),
        Primitive::Char => {
            let code: u32 = read(input, "char")?;
            let c = char::from_u32(code).ok_or_else(|| decode_failed(format!("{code:#x} is not a char")))?;
            NormalizedValue::Str(c.to_string())
        }
        Primitive::Str => NormalizedValue::Str(read(input, "str")?),
        Primitive::U8 => NormalizedValue::Uint(read::<u8>(input, "u8")?.into()),
        Primitive::U16 => NormalizedValue::Uint(read::<u16>(input, "u16")?.into()),
        Primitive::U32 => NormalizedValue::Uint(read::<u32>(input, "u32")?.into()),
        Primitive::U64 => NormalizedValue::Uint(read::<u64>(input, "u64")?.into()),
        Primitive::U128 => NormalizedValue::Uint(read(input, "u128")?),
        Primitive::U256 => {
            let le: [u8; 32] = read(input, "u256")?;
            let v = U256::from_le_slice(&le);
            match u128::try_from(v) {
                Ok(small) => NormalizedValue::Uint(small),
                Err(_) => NormalizedValue::BigUint(v.to_string()),
            }
        }
        Primitive::I8 => NormalizedValue::Int(read::<i8>(input, "i8")?.into()),
        Primitive::I16 => NormalizedValue::Int(read::<i16>(input, "i16")?.into()),
        Primitive::I32 => NormalizedValue::Int(read::<i32>(input, "i32")?.into()),
        Primitive::I64 => NormalizedValue::Int(read::<i64>(input, "i64")?.into()),
        Primitive::I128 => NormalizedValue::Int(read(input, "i128")?),
        Primitive::I256 => {
            let le: [u8; 32] = read(input, "i256")?;
            let v = I256::from_raw(U256::from_le_slice(&le)).to_string();
            match v.parse::<i128>() {
                Ok(small) => NormalizedValue::Int(small),
                Err(_) => NormalizedValue::BigInt(v),
            }
        }
    };
    Ok(value)
}
