//! Canonical DAG-CBOR encoding for operation payloads.
//!
//! `serde_ipld_dagcbor` already implements the DAG-CBOR profile (definite
//! lengths, shortest-form integers, no floats needed here); the only
//! canonicality rule this module has to get right itself is map-key
//! ordering. `BTreeMap<String, _>`'s default `Ord` is already "lexicographic
//! over UTF-8 bytes, shorter prefix sorts first": exactly the canonical
//! DAG-CBOR map-key rule, so building every map level as a `BTreeMap` is
//! sufficient; no custom comparator is needed.

use std::collections::BTreeMap;

use ipld_core::ipld::Ipld;

use crate::error::{PlcError, Result};

/// Build a canonical DAG-CBOR map from field/value pairs. Field order in
/// `entries` does not matter; `BTreeMap` sorts them canonically on encode.
pub fn map(entries: Vec<(&str, Ipld)>) -> Ipld {
    let mut m = BTreeMap::new();
    for (key, value) in entries {
        m.insert(key.to_string(), value);
    }
    Ipld::Map(m)
}

pub fn string_list(items: &[String]) -> Ipld {
    Ipld::List(items.iter().cloned().map(Ipld::String).collect())
}

/// Encode an [`Ipld`] value as canonical DAG-CBOR bytes. Total over any
/// value this crate builds; the `Result` exists for the trait boundary, not
/// because failure is anticipated here.
pub fn encode(value: &Ipld) -> Result<Vec<u8>> {
    serde_ipld_dagcbor::to_vec(value)
        .map_err(|e| PlcError::CborEncodingError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_key_order_is_canonical() {
        // Built in an arbitrary order; BTreeMap sorts on iteration.
        let value = map(vec![
            ("type", Ipld::String("plc_operation".into())),
            ("alsoKnownAs", Ipld::List(vec![])),
            ("verificationMethods", Ipld::Map(BTreeMap::new())),
            ("prev", Ipld::Null),
            ("rotationKeys", Ipld::List(vec![])),
            ("services", Ipld::Map(BTreeMap::new())),
        ]);
        let Ipld::Map(m) = &value else { panic!("expected map") };
        let keys: Vec<&str> = m.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec![
                "alsoKnownAs",
                "prev",
                "rotationKeys",
                "services",
                "type",
                "verificationMethods",
            ]
        );
    }

    #[test]
    fn encoding_is_deterministic_across_construction_order() {
        let a = map(vec![
            ("z", Ipld::Integer(1)),
            ("a", Ipld::Integer(2)),
            ("m", Ipld::Integer(3)),
        ]);
        let b = map(vec![
            ("a", Ipld::Integer(2)),
            ("m", Ipld::Integer(3)),
            ("z", Ipld::Integer(1)),
        ]);
        assert_eq!(encode(&a).unwrap(), encode(&b).unwrap());
    }

    #[test]
    fn null_encodes_absent_prev() {
        let value = map(vec![("prev", Ipld::Null)]);
        let bytes = encode(&value).unwrap();
        // A1 (map, 1 entry) 64 'prev' F6 (null)
        assert_eq!(bytes, vec![0xa1, 0x64, b'p', b'r', b'e', b'v', 0xf6]);
    }
}
