//! # shmkv Codec
//!
//! Value serialization for shmkv variables.
//!
//! Any `serde` type can be stored in a segment. Values are encoded as CBOR
//! with `ciborium`, which keeps them compact and self-describing so a
//! sibling process can read them back as a different but compatible type,
//! or as a dynamic [`Value`].
//!
//! ## The Reserved Sentinel
//!
//! CBOR `false` (the single byte `0xF4`) is reserved. Shared memory variable
//! tables have traditionally answered "no such variable" with `false`, so a
//! stored `false` would be indistinguishable from a missing one for any
//! reader that follows that convention. [`is_reserved`] lets callers refuse
//! such values before they are written.
//!
//! ## Usage
//!
//! ```
//! use shmkv_codec::{decode, encode, is_reserved};
//!
//! let bytes = encode(&42u32).unwrap();
//! let back: u32 = decode(&bytes).unwrap();
//! assert_eq!(back, 42);
//!
//! assert!(is_reserved(&encode(&false).unwrap()));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;

pub use ciborium::Value;
pub use error::{CodecError, CodecResult};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Encoded form of the reserved sentinel: CBOR `false`.
pub const RESERVED_SENTINEL: [u8; 1] = [0xf4];

/// Encode a value to CBOR bytes.
///
/// # Errors
///
/// Returns an error if the value's `Serialize` impl fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> CodecResult<Vec<u8>> {
    let mut bytes = Vec::new();
    ciborium::into_writer(value, &mut bytes).map_err(CodecError::EncodingFailed)?;
    Ok(bytes)
}

/// Decode a value from CBOR bytes.
///
/// # Errors
///
/// Returns an error if the bytes are not valid CBOR or do not match `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> CodecResult<T> {
    ciborium::from_reader(bytes).map_err(CodecError::DecodingFailed)
}

/// Returns `true` if `encoded` is the reserved sentinel.
#[must_use]
pub fn is_reserved(encoded: &[u8]) -> bool {
    encoded == RESERVED_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Bar {
        asd: Vec<i32>,
        label: Option<String>,
    }

    #[derive(Debug, Serialize)]
    struct Flag(bool);

    #[test]
    fn struct_roundtrip() {
        let bar = Bar {
            asd: vec![1, 2, 3],
            label: None,
        };
        let bytes = encode(&bar).unwrap();
        assert_eq!(decode::<Bar>(&bytes).unwrap(), bar);
    }

    #[test]
    fn integer_is_compact() {
        assert_eq!(encode(&42u8).unwrap(), vec![0x18, 0x2a]);
    }

    #[test]
    fn false_is_reserved() {
        assert_eq!(encode(&false).unwrap(), RESERVED_SENTINEL);
        assert!(is_reserved(&encode(&false).unwrap()));
    }

    #[test]
    fn false_in_disguise_is_reserved() {
        assert!(is_reserved(&encode(&Some(false)).unwrap()));
        assert!(is_reserved(&encode(&Flag(false)).unwrap()));
    }

    #[test]
    fn other_falsy_values_are_not_reserved() {
        assert!(!is_reserved(&encode(&true).unwrap()));
        assert!(!is_reserved(&encode(&0).unwrap()));
        assert!(!is_reserved(&encode("").unwrap()));
        assert!(!is_reserved(&encode(&Option::<bool>::None).unwrap()));
        assert!(!is_reserved(&encode(&Vec::<u8>::new()).unwrap()));
    }

    #[test]
    fn decode_as_dynamic_value() {
        let mut map = BTreeMap::new();
        map.insert("count", 2);
        let bytes = encode(&map).unwrap();

        let value: Value = decode(&bytes).unwrap();
        assert!(value.is_map());
    }

    #[test]
    fn decode_type_mismatch_fails() {
        let bytes = encode("text").unwrap();
        let err = decode::<u64>(&bytes).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed(_)));
        assert!(err.is_type_mismatch());
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("cannot decode stored variable"));
    }

    #[test]
    fn decode_garbage_fails() {
        let err = decode::<Bar>(&[0xff, 0x00]).unwrap_err();
        assert!(matches!(err, CodecError::DecodingFailed(_)));
        assert!(!err.is_type_mismatch());
    }

    #[test]
    fn decode_truncated_fails() {
        let bytes = encode(&Bar {
            asd: vec![1, 2, 3],
            label: Some("x".into()),
        })
        .unwrap();
        let err = decode::<Bar>(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(!err.is_type_mismatch());
    }

    proptest! {
        #[test]
        fn only_false_is_reserved(v in any::<i64>(), s in ".*") {
            prop_assert!(!is_reserved(&encode(&v).unwrap()));
            prop_assert!(!is_reserved(&encode(&s).unwrap()));
        }
    }
}
