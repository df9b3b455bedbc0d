//! DID and CID derivation from signed operations.

use sha2::{Digest, Sha256};

use crate::codec::multibase;
use crate::error::Result;
use crate::operation::Signed;

/// The CIDv1 of a signed operation: `0x01 0x71 0x12 0x20 || sha256(bytes)`,
/// base32-multibase-encoded.
pub fn cid(signed: &impl Signed) -> Result<String> {
    let bytes = signed.encode_full()?;
    let digest = Sha256::digest(&bytes);
    let mut binary = Vec::with_capacity(4 + digest.len());
    binary.extend_from_slice(&[0x01, 0x71, 0x12, 0x20]);
    binary.extend_from_slice(&digest);
    Ok(multibase::base32_encode(&binary))
}

/// Derive a DID from the signed genesis operation: base32-encode the raw
/// SHA-256 digest, take the first 24 lowercase characters, prepend
/// `did:plc:`. This 24-character truncation is protocol-defined; do not
/// extend it "for safety".
pub fn derive_did(signed_genesis: &impl Signed) -> Result<String> {
    let bytes = signed_genesis.encode_full()?;
    let digest = Sha256::digest(&bytes);
    let encoded = multibase::base32_encode(&digest);
    let suffix = &encoded[1..25];
    Ok(format!("did:plc:{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Curve;
    use crate::key::Key;
    use crate::operation::Operation;
    use regex::Regex;
    use std::collections::BTreeMap;

    fn genesis() -> crate::operation::SignedOperation {
        let rotation_key = Key::generate(Curve::Secp256k1);
        let verification_key = Key::generate(Curve::Ed25519);
        let mut verification_methods = BTreeMap::new();
        verification_methods.insert("fair_abc123".to_string(), verification_key);
        Operation {
            rotation_keys: vec![rotation_key.clone()],
            verification_methods,
            also_known_as: vec!["at://my-plugin".to_string()],
            services: BTreeMap::new(),
            prev: None,
        }
        .sign(&rotation_key)
        .unwrap()
    }

    #[test]
    fn did_matches_shape() {
        let signed = genesis();
        let did = derive_did(&signed).unwrap();
        let re = Regex::new(r"^did:plc:[a-z2-7]{24}$").unwrap();
        assert!(re.is_match(&did), "did {did} does not match expected shape");
    }

    #[test]
    fn did_is_deterministic() {
        let signed = genesis();
        assert_eq!(derive_did(&signed).unwrap(), derive_did(&signed).unwrap());
    }

    #[test]
    fn cid_has_expected_prefix_and_length() {
        let signed = genesis();
        let encoded = cid(&signed).unwrap();
        assert!(encoded.starts_with('b'));
        let raw = multibase::base32_decode(&encoded).unwrap();
        assert_eq!(raw.len(), 36);
        assert_eq!(&raw[..4], &[0x01, 0x71, 0x12, 0x20]);
    }
}
