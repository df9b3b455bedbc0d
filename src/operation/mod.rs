//! The PLC operation model.
//!
//! The source toggles a nullable `sig` field on one type; here `Operation`
//! (always unsigned) and `SignedOperation` are distinct so a CID can never be
//! taken of something that was never signed. `Tombstone` is smaller still,
//! it carries no key material at all.

use std::collections::BTreeMap;

use base64::Engine;
use ipld_core::ipld::Ipld;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::codec::cbor;
use crate::error::{InvalidOperationReason, PlcError, Result};
use crate::key::Key;

const TYPE_OPERATION: &str = "plc_operation";
const TYPE_TOMBSTONE: &str = "plc_tombstone";

fn base64url_nopad(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

fn base64url_nopad_decode(s: &str) -> Result<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(s)
        .map_err(PlcError::from)
}

/// A service entry, e.g. `atproto_pds`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    #[serde(rename = "type")]
    pub type_: String,
    pub endpoint: String,
}

/// An unsigned PLC operation. Always `type = "plc_operation"`; tombstones
/// are a distinct type below.
#[derive(Debug, Clone)]
pub struct Operation {
    pub rotation_keys: Vec<Key>,
    pub verification_methods: BTreeMap<String, Key>,
    pub also_known_as: Vec<String>,
    pub services: BTreeMap<String, Service>,
    pub prev: Option<String>,
}

impl Operation {
    /// Validate structural invariants. `allow_empty` is set
    /// only by the deactivation path's soft-deactivation case; everywhere
    /// else an empty `rotationKeys`/`verificationMethods` is rejected.
    pub fn validate(&self, allow_empty: bool) -> Result<()> {
        if !allow_empty && self.rotation_keys.is_empty() {
            return Err(PlcError::InvalidOperation(InvalidOperationReason::EmptyRotationKeys));
        }
        if !allow_empty && self.verification_methods.is_empty() {
            return Err(PlcError::InvalidOperation(InvalidOperationReason::EmptyVerificationMethods));
        }
        Ok(())
    }

    fn did_key(key: &Key) -> String {
        format!("did:key:{}", key.encode_public())
    }

    fn rotation_keys_ipld(&self) -> Ipld {
        cbor::string_list(&self.rotation_keys.iter().map(Self::did_key).collect::<Vec<_>>())
    }

    fn verification_methods_ipld(&self) -> Ipld {
        let map = self
            .verification_methods
            .iter()
            .map(|(id, key)| (id.clone(), Ipld::String(Self::did_key(key))))
            .collect::<BTreeMap<_, _>>();
        Ipld::Map(map)
    }

    fn also_known_as_ipld(&self) -> Ipld {
        cbor::string_list(&self.also_known_as)
    }

    fn services_ipld(&self) -> Ipld {
        let map = self
            .services
            .iter()
            .map(|(id, svc)| {
                let entry = cbor::map(vec![
                    ("type", Ipld::String(svc.type_.clone())),
                    ("endpoint", Ipld::String(svc.endpoint.clone())),
                ]);
                (id.clone(), entry)
            })
            .collect::<BTreeMap<_, _>>();
        Ipld::Map(map)
    }

    fn prev_ipld(&self) -> Ipld {
        match &self.prev {
            Some(cid) => Ipld::String(cid.clone()),
            None => Ipld::Null,
        }
    }

    /// Canonical DAG-CBOR bytes for signing: the six fields with no `sig`.
    pub fn encode_for_signing(&self) -> Result<Vec<u8>> {
        let value = cbor::map(vec![
            ("type", Ipld::String(TYPE_OPERATION.to_string())),
            ("rotationKeys", self.rotation_keys_ipld()),
            ("verificationMethods", self.verification_methods_ipld()),
            ("alsoKnownAs", self.also_known_as_ipld()),
            ("services", self.services_ipld()),
            ("prev", self.prev_ipld()),
        ]);
        cbor::encode(&value)
    }

    /// Sign this operation with a rotation key. The digest input to the key
    /// is `hex(SHA256(encode_for_signing()))`; the resulting signature bytes
    /// are base64url-without-padding encoded into `sig`.
    pub fn sign(self, rotation_key: &Key) -> Result<SignedOperation> {
        let bytes = self.encode_for_signing()?;
        let digest_hex = hex::encode(Sha256::digest(&bytes));
        let sig_hex = rotation_key.sign(&digest_hex)?;
        let sig_bytes = hex::decode(sig_hex)?;
        Ok(SignedOperation { operation: self, sig: base64url_nopad(&sig_bytes) })
    }

    /// The submission payload for an as-yet-unsigned operation (no `sig`).
    pub fn to_wire(&self) -> serde_json::Value {
        wire_fields(self, None)
    }

    fn key_from_did_key(s: &str) -> Result<Key> {
        let mb = s
            .strip_prefix("did:key:")
            .ok_or_else(|| PlcError::InvalidOperation(InvalidOperationReason::InvalidKeyMaterial))?;
        Key::from_public(mb)
    }

    /// Reconstruct an `Operation` from the wire JSON of a previously
    /// submitted operation (as returned by the directory's last-operation
    /// endpoint); the manager's update/rotate/deactivate flows build their
    /// next operation on top of this.
    pub fn from_wire(value: &serde_json::Value) -> Result<Operation> {
        let bad_key_material = || PlcError::InvalidOperation(InvalidOperationReason::InvalidKeyMaterial);

        let rotation_keys = value["rotationKeys"]
            .as_array()
            .ok_or_else(bad_key_material)?
            .iter()
            .map(|v| v.as_str().ok_or_else(bad_key_material).and_then(Self::key_from_did_key))
            .collect::<Result<Vec<_>>>()?;

        let verification_methods = value["verificationMethods"]
            .as_object()
            .ok_or_else(bad_key_material)?
            .iter()
            .map(|(id, v)| {
                let s = v.as_str().ok_or_else(bad_key_material)?;
                Ok((id.clone(), Self::key_from_did_key(s)?))
            })
            .collect::<Result<BTreeMap<_, _>>>()?;

        let also_known_as = value["alsoKnownAs"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let services = value["services"]
            .as_object()
            .map(|obj| {
                obj.iter()
                    .filter_map(|(id, v)| {
                        let type_ = v.get("type")?.as_str()?.to_string();
                        let endpoint = v.get("endpoint")?.as_str()?.to_string();
                        Some((id.clone(), Service { type_, endpoint }))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let prev = value["prev"].as_str().map(str::to_string);

        Ok(Operation { rotation_keys, verification_methods, also_known_as, services, prev })
    }
}

fn wire_fields(op: &Operation, sig: Option<&str>) -> serde_json::Value {
    let rotation_keys: Vec<String> = op.rotation_keys.iter().map(Operation::did_key).collect();
    let verification_methods: serde_json::Map<String, serde_json::Value> = op
        .verification_methods
        .iter()
        .map(|(id, key)| (id.clone(), serde_json::Value::String(Operation::did_key(key))))
        .collect();
    let services: serde_json::Map<String, serde_json::Value> = op
        .services
        .iter()
        .map(|(id, svc)| {
            let entry = serde_json::json!({ "type": svc.type_, "endpoint": svc.endpoint });
            (id.clone(), entry)
        })
        .collect();

    let mut out = serde_json::Map::new();
    out.insert("type".into(), serde_json::Value::String(TYPE_OPERATION.into()));
    out.insert("rotationKeys".into(), serde_json::Value::Array(
        rotation_keys.into_iter().map(serde_json::Value::String).collect(),
    ));
    out.insert("verificationMethods".into(), serde_json::Value::Object(verification_methods));
    out.insert("alsoKnownAs".into(), serde_json::Value::Array(
        op.also_known_as.iter().cloned().map(serde_json::Value::String).collect(),
    ));
    out.insert("services".into(), serde_json::Value::Object(services));
    out.insert("prev".into(), match &op.prev {
        Some(cid) => serde_json::Value::String(cid.clone()),
        None => serde_json::Value::Null,
    });
    if let Some(sig) = sig {
        out.insert("sig".into(), serde_json::Value::String(sig.to_string()));
    }
    serde_json::Value::Object(out)
}

/// A signed PLC operation. Immutable once produced; content-addressed by
/// its CID (see `crate::identity`).
#[derive(Debug, Clone)]
pub struct SignedOperation {
    pub operation: Operation,
    pub sig: String,
}

impl SignedOperation {
    /// Canonical DAG-CBOR bytes including `sig`, used for CID/DID derivation.
    pub fn encode_full(&self) -> Result<Vec<u8>> {
        let value = cbor::map(vec![
            ("type", Ipld::String(TYPE_OPERATION.to_string())),
            ("rotationKeys", self.operation.rotation_keys_ipld()),
            ("verificationMethods", self.operation.verification_methods_ipld()),
            ("alsoKnownAs", self.operation.also_known_as_ipld()),
            ("services", self.operation.services_ipld()),
            ("prev", self.operation.prev_ipld()),
            ("sig", Ipld::String(self.sig.clone())),
        ]);
        cbor::encode(&value)
    }

    pub fn to_wire(&self) -> serde_json::Value {
        wire_fields(&self.operation, Some(&self.sig))
    }

    /// Decode `sig` back to raw signature bytes, hex-encoded, for
    /// verification against a rotation key's public component.
    pub fn sig_hex(&self) -> Result<String> {
        Ok(hex::encode(base64url_nopad_decode(&self.sig)?))
    }
}

/// A tombstone: the terminal operation on a DID's log. Carries no key
/// material, only `prev` and `sig`.
#[derive(Debug, Clone)]
pub struct Tombstone {
    pub prev: String,
    pub sig: String,
}

impl Tombstone {
    fn encode_for_signing(prev: &str) -> Result<Vec<u8>> {
        let value = cbor::map(vec![
            ("type", Ipld::String(TYPE_TOMBSTONE.to_string())),
            ("prev", Ipld::String(prev.to_string())),
        ]);
        cbor::encode(&value)
    }

    /// Sign a tombstone over `prev` with the current rotation key, using the
    /// same DAG-CBOR/SHA-256/base64url rule as `Operation::sign`: directories
    /// that accept `plc_operation` DAG-CBOR signatures accept this form too,
    /// and it keeps one signing path instead of two.
    pub fn sign(prev: String, rotation_key: &Key) -> Result<Tombstone> {
        let bytes = Self::encode_for_signing(&prev)?;
        let digest_hex = hex::encode(Sha256::digest(&bytes));
        let sig_hex = rotation_key.sign(&digest_hex)?;
        let sig_bytes = hex::decode(sig_hex)?;
        Ok(Tombstone { prev, sig: base64url_nopad(&sig_bytes) })
    }

    pub fn encode_full(&self) -> Result<Vec<u8>> {
        let value = cbor::map(vec![
            ("type", Ipld::String(TYPE_TOMBSTONE.to_string())),
            ("prev", Ipld::String(self.prev.clone())),
            ("sig", Ipld::String(self.sig.clone())),
        ]);
        cbor::encode(&value)
    }

    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({ "type": TYPE_TOMBSTONE, "prev": self.prev, "sig": self.sig })
    }
}

/// Any finalized (signed) operation that can be content-addressed.
pub trait Signed {
    fn encode_full(&self) -> Result<Vec<u8>>;
}

impl Signed for SignedOperation {
    fn encode_full(&self) -> Result<Vec<u8>> {
        SignedOperation::encode_full(self)
    }
}

impl Signed for Tombstone {
    fn encode_full(&self) -> Result<Vec<u8>> {
        Tombstone::encode_full(self)
    }
}

/// Canonical-JSON helper, kept distinct from the DAG-CBOR signing path
/// above for historical tombstone-signing compatibility. `serde_json::Value`'s
/// default map representation is already key-sorted, so this is a thin,
/// documented wrapper rather than a hand-rolled sort.
pub fn canonical_json(value: &serde_json::Value) -> Result<String> {
    serde_json::to_string(value).map_err(PlcError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Curve;

    fn sample_operation() -> (Operation, Key) {
        let rotation_key = Key::generate(Curve::Secp256k1);
        let verification_key = Key::generate(Curve::Ed25519);
        let method_id = format!(
            "fair_{}",
            &hex::encode(Sha256::digest(verification_key.encode_public().as_bytes()))[..6]
        );
        let mut verification_methods = BTreeMap::new();
        verification_methods.insert(method_id, verification_key);
        let op = Operation {
            rotation_keys: vec![rotation_key.clone()],
            verification_methods,
            also_known_as: vec!["at://my-plugin".to_string()],
            services: BTreeMap::new(),
            prev: None,
        };
        (op, rotation_key)
    }

    #[test]
    fn encoding_for_signing_omits_sig_and_rejects_empty_rotation_keys() {
        let (op, _rk) = sample_operation();
        assert!(op.validate(false).is_ok());

        let empty = Operation { rotation_keys: vec![], ..op };
        assert!(matches!(
            empty.validate(false),
            Err(PlcError::InvalidOperation(InvalidOperationReason::EmptyRotationKeys))
        ));
        assert!(empty.validate(true).is_ok());
    }

    #[test]
    fn sign_then_wire_round_trip_carries_sig() {
        let (op, rotation_key) = sample_operation();
        let wire_before = op.to_wire();
        assert!(wire_before.get("sig").is_none());

        let signed = op.sign(&rotation_key).unwrap();
        let wire_after = signed.to_wire();
        assert_eq!(wire_after["sig"], serde_json::Value::String(signed.sig.clone()));
    }

    #[test]
    fn services_always_render_as_object_even_when_empty() {
        let (op, _rk) = sample_operation();
        let wire = op.to_wire();
        assert_eq!(wire["services"], serde_json::json!({}));
    }

    #[test]
    fn encode_full_is_idempotent() {
        let (op, rotation_key) = sample_operation();
        let signed = op.sign(&rotation_key).unwrap();
        assert_eq!(signed.encode_full().unwrap(), signed.encode_full().unwrap());
    }

    #[test]
    fn tombstone_signs_over_minimal_map() {
        let rotation_key = Key::generate(Curve::Secp256k1);
        let tombstone = Tombstone::sign("bafyreiprev".to_string(), &rotation_key).unwrap();
        let wire = tombstone.to_wire();
        assert_eq!(wire["type"], "plc_tombstone");
        assert_eq!(wire["prev"], "bafyreiprev");
    }

    #[test]
    fn from_wire_reconstructs_equivalent_operation() {
        let (op, rotation_key) = sample_operation();
        let wire = op.to_wire();
        let reconstructed = Operation::from_wire(&wire).unwrap();
        assert_eq!(reconstructed.also_known_as, op.also_known_as);
        assert_eq!(reconstructed.rotation_keys[0].encode_public(), rotation_key.encode_public());
    }

    #[test]
    fn canonical_json_sorts_keys() {
        let value = serde_json::json!({ "z": 1, "a": 2, "m": 3 });
        assert_eq!(canonical_json(&value).unwrap(), r#"{"a":2,"m":3,"z":1}"#);
    }
}
