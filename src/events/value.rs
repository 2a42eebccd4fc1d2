//! Tagged argument values.
//!
//! Decoded ABI values are flattened into a small closed set so callers never
//! touch `DynSolValue` directly.

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::hex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ArgValue {
    String(String),
    /// Decimal text; int/uint widths up to 256 bits do not fit a native integer.
    Number(String),
    Bool(bool),
    /// EIP-55 checksummed.
    Address(String),
    /// `0x`-prefixed hex.
    Bytes(String),
    Array(Vec<ArgValue>),
    Tuple(Vec<ArgValue>),
}

impl From<DynSolValue> for ArgValue {
    fn from(value: DynSolValue) -> Self {
        match value {
            DynSolValue::Bool(b) => ArgValue::Bool(b),
            DynSolValue::Int(i, _) => ArgValue::Number(i.to_string()),
            DynSolValue::Uint(u, _) => ArgValue::Number(u.to_string()),
            DynSolValue::FixedBytes(word, size) => {
                ArgValue::Bytes(hex::encode_prefixed(&word[..size]))
            }
            DynSolValue::Address(a) => ArgValue::Address(a.to_checksum(None)),
            DynSolValue::Function(f) => ArgValue::Bytes(hex::encode_prefixed(f.as_slice())),
            DynSolValue::Bytes(b) => ArgValue::Bytes(hex::encode_prefixed(b)),
            DynSolValue::String(s) => ArgValue::String(s),
            DynSolValue::Array(values) | DynSolValue::FixedArray(values) => {
                ArgValue::Array(values.into_iter().map(ArgValue::from).collect())
            }
            DynSolValue::Tuple(values) => {
                ArgValue::Tuple(values.into_iter().map(ArgValue::from).collect())
            }
            #[allow(unreachable_patterns)]
            other => ArgValue::String(format!("{:?}", other)),
        }
    }
}

impl std::fmt::Display for ArgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArgValue::String(s)
            | ArgValue::Number(s)
            | ArgValue::Address(s)
            | ArgValue::Bytes(s) => f.write_str(s),
            ArgValue::Bool(b) => write!(f, "{}", b),
            ArgValue::Array(values) => write!(f, "[{}]", join(values)),
            ArgValue::Tuple(values) => write!(f, "({})", join(values)),
        }
    }
}

fn join(values: &[ArgValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, I256, U256};

    #[test]
    fn uint256_keeps_full_precision() {
        let v = ArgValue::from(DynSolValue::Uint(U256::MAX, 256));
        assert_eq!(v, ArgValue::Number(U256::MAX.to_string()));
    }

    #[test]
    fn negative_int() {
        let v = ArgValue::from(DynSolValue::Int("-7".parse::<I256>().unwrap(), 24));
        assert_eq!(v, ArgValue::Number("-7".to_string()));
    }

    #[test]
    fn address_is_checksummed() {
        let addr: Address = "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".parse().unwrap();
        let v = ArgValue::from(DynSolValue::Address(addr));
        assert_eq!(
            v,
            ArgValue::Address("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".to_string())
        );
    }

    #[test]
    fn fixed_bytes_are_trimmed_to_their_width() {
        let mut word = B256::ZERO;
        word[0] = 0xab;
        word[1] = 0xcd;
        let v = ArgValue::from(DynSolValue::FixedBytes(word, 2));
        assert_eq!(v, ArgValue::Bytes("0xabcd".to_string()));
    }

    #[test]
    fn composite_values_render_nested() {
        let v = ArgValue::from(DynSolValue::Tuple(vec![
            DynSolValue::Bool(false),
            DynSolValue::Array(vec![DynSolValue::String("a".into())]),
        ]));
        assert_eq!(v.to_string(), "(false, [a])");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(ArgValue::Bool(true)).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "bool", "value": true}));
    }
}
