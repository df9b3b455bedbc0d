//! Key generation, multibase encoding and signing for the three curves PLC
//! supports. A `Key` is a tagged variant over three
//! concrete payload types that share no implementation, only the interface
//! below, deliberately not a class hierarchy.

use ecdsa::elliptic_curve::sec1::ToEncodedPoint;
use ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use ed25519_dalek::{Signer as _, Verifier as _};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::codec::multibase::{self, Curve};
use crate::error::{PlcError, Result};

type PrivateBytes = Zeroizing<[u8; 32]>;

/// A key on one of the three supported curves, optionally holding the
/// private scalar/seed. Private bytes are zeroized on drop.
#[derive(Clone)]
pub enum Key {
    Secp256k1 {
        public: [u8; 33],
        private: Option<PrivateBytes>,
    },
    P256 {
        public: [u8; 33],
        private: Option<PrivateBytes>,
    },
    Ed25519 {
        public: [u8; 32],
        private: Option<PrivateBytes>,
    },
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Key")
            .field("curve", &self.curve())
            .field("public", &self.encode_public())
            .field("private", &self.is_private().then_some("[REDACTED]"))
            .finish()
    }
}

impl Key {
    /// Generate a new key on `curve` using a cryptographically strong RNG.
    /// Ed25519 uses 32 uniform seed bytes; the EC curves rejection-sample
    /// into `[1, n-1]` via their own `SecretKey::random`.
    pub fn generate(curve: Curve) -> Key {
        match curve {
            Curve::Secp256k1 => {
                let secret = k256::SecretKey::random(&mut OsRng);
                let public = secret.public_key().to_encoded_point(true);
                Key::Secp256k1 {
                    public: public.as_bytes().try_into().expect("compressed SEC1 is 33 bytes"),
                    private: Some(Zeroizing::new(secret.to_bytes().as_slice().try_into().expect("32-byte scalar"))),
                }
            }
            Curve::P256 => {
                let secret = p256::SecretKey::random(&mut OsRng);
                let public = secret.public_key().to_encoded_point(true);
                Key::P256 {
                    public: public.as_bytes().try_into().expect("compressed SEC1 is 33 bytes"),
                    private: Some(Zeroizing::new(secret.to_bytes().as_slice().try_into().expect("32-byte scalar"))),
                }
            }
            Curve::Ed25519 => {
                let signing_key = ed25519_dalek::SigningKey::generate(&mut OsRng);
                Key::Ed25519 {
                    public: signing_key.verifying_key().to_bytes(),
                    private: Some(Zeroizing::new(signing_key.to_bytes())),
                }
            }
        }
    }

    pub fn curve(&self) -> Curve {
        match self {
            Key::Secp256k1 { .. } => Curve::Secp256k1,
            Key::P256 { .. } => Curve::P256,
            Key::Ed25519 { .. } => Curve::Ed25519,
        }
    }

    pub fn is_private(&self) -> bool {
        match self {
            Key::Secp256k1 { private, .. } => private.is_some(),
            Key::P256 { private, .. } => private.is_some(),
            Key::Ed25519 { private, .. } => private.is_some(),
        }
    }

    fn public_bytes(&self) -> &[u8] {
        match self {
            Key::Secp256k1 { public, .. } => public,
            Key::P256 { public, .. } => public,
            Key::Ed25519 { public, .. } => public,
        }
    }

    fn private_bytes(&self) -> Option<&[u8; 32]> {
        match self {
            Key::Secp256k1 { private, .. } => private.as_deref(),
            Key::P256 { private, .. } => private.as_deref(),
            Key::Ed25519 { private, .. } => private.as_deref(),
        }
    }

    pub fn encode_public(&self) -> String {
        multibase::encode_key(self.curve(), false, self.public_bytes())
    }

    pub fn encode_private(&self) -> Result<String> {
        let private = self.private_bytes().ok_or(PlcError::NotAPrivateKey)?;
        Ok(multibase::encode_key(self.curve(), true, private))
    }

    /// Decode a public-key multibase string.
    pub fn from_public(mbstr: &str) -> Result<Key> {
        let (curve, _legacy, raw) = multibase::decode_key(mbstr, false)?;
        Self::from_public_bytes(curve, &raw)
    }

    /// Decode a private-key multibase string. Accepts the legacy
    /// public-tag-as-private encoding.
    pub fn from_private(mbstr: &str) -> Result<Key> {
        let (curve, _legacy, raw) = multibase::decode_key(mbstr, true)?;
        Self::from_private_bytes(curve, &raw)
    }

    fn from_public_bytes(curve: Curve, raw: &[u8]) -> Result<Key> {
        match curve {
            Curve::Secp256k1 => {
                let point = k256::PublicKey::from_sec1_bytes(raw)
                    .map_err(|e| PlcError::MalformedMultibase(format!("invalid secp256k1 point: {e}")))?;
                let compressed = point.to_encoded_point(true);
                Ok(Key::Secp256k1 {
                    public: compressed.as_bytes().try_into().expect("compressed SEC1 is 33 bytes"),
                    private: None,
                })
            }
            Curve::P256 => {
                let point = p256::PublicKey::from_sec1_bytes(raw)
                    .map_err(|e| PlcError::MalformedMultibase(format!("invalid P-256 point: {e}")))?;
                let compressed = point.to_encoded_point(true);
                Ok(Key::P256 {
                    public: compressed.as_bytes().try_into().expect("compressed SEC1 is 33 bytes"),
                    private: None,
                })
            }
            Curve::Ed25519 => {
                let array: [u8; 32] = raw
                    .try_into()
                    .map_err(|_| PlcError::MalformedMultibase("ed25519 public key must be 32 bytes".into()))?;
                ed25519_dalek::VerifyingKey::from_bytes(&array)
                    .map_err(|e| PlcError::MalformedMultibase(format!("invalid ed25519 point: {e}")))?;
                Ok(Key::Ed25519 { public: array, private: None })
            }
        }
    }

    fn from_private_bytes(curve: Curve, raw: &[u8]) -> Result<Key> {
        match curve {
            Curve::Secp256k1 => {
                let secret = k256::SecretKey::from_slice(raw)
                    .map_err(|e| PlcError::MalformedMultibase(format!("invalid secp256k1 scalar: {e}")))?;
                let public = secret.public_key().to_encoded_point(true);
                Ok(Key::Secp256k1 {
                    public: public.as_bytes().try_into().expect("compressed SEC1 is 33 bytes"),
                    private: Some(Zeroizing::new(secret.to_bytes().as_slice().try_into().expect("32-byte scalar"))),
                })
            }
            Curve::P256 => {
                let secret = p256::SecretKey::from_slice(raw)
                    .map_err(|e| PlcError::MalformedMultibase(format!("invalid P-256 scalar: {e}")))?;
                let public = secret.public_key().to_encoded_point(true);
                Ok(Key::P256 {
                    public: public.as_bytes().try_into().expect("compressed SEC1 is 33 bytes"),
                    private: Some(Zeroizing::new(secret.to_bytes().as_slice().try_into().expect("32-byte scalar"))),
                })
            }
            Curve::Ed25519 => {
                let array: [u8; 32] = raw
                    .try_into()
                    .map_err(|_| PlcError::MalformedMultibase("ed25519 private key must be 32 bytes".into()))?;
                let signing_key = ed25519_dalek::SigningKey::from_bytes(&array);
                Ok(Key::Ed25519 {
                    public: signing_key.verifying_key().to_bytes(),
                    private: Some(Zeroizing::new(array)),
                })
            }
        }
    }

    /// Sign the raw bytes of a hex-encoded SHA-256 digest. Per curve:
    /// secp256k1/P-256 sign the prehash directly with ECDSA (low-S
    /// normalized); Ed25519 signs the digest bytes as its message.
    /// Returns the hex-encoded signature in each curve's wire form
    /// (compact IEEE-P1363 for secp256k1, DER for P-256, raw R‖S for
    /// Ed25519).
    pub fn sign(&self, digest_hex: &str) -> Result<String> {
        let digest = hex::decode(digest_hex)?;
        match self {
            Key::Secp256k1 { private, .. } => {
                let raw = private.as_deref().ok_or(PlcError::NotAPrivateKey)?;
                let signing_key = k256::ecdsa::SigningKey::from_slice(raw)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                let sig: k256::ecdsa::Signature = signing_key.sign_prehash(&digest)?;
                let sig = sig.normalize_s().unwrap_or(sig);
                Ok(hex::encode(sig.to_bytes()))
            }
            Key::P256 { private, .. } => {
                let raw = private.as_deref().ok_or(PlcError::NotAPrivateKey)?;
                let signing_key = p256::ecdsa::SigningKey::from_slice(raw)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                let sig: p256::ecdsa::Signature = signing_key.sign_prehash(&digest)?;
                let sig = sig.normalize_s().unwrap_or(sig);
                Ok(hex::encode(sig.to_der().as_bytes()))
            }
            Key::Ed25519 { private, .. } => {
                let raw = private.as_deref().ok_or(PlcError::NotAPrivateKey)?;
                let signing_key = ed25519_dalek::SigningKey::from_bytes(raw);
                let sig = signing_key.sign(&digest);
                Ok(hex::encode(sig.to_bytes()))
            }
        }
    }

    /// Verify a hex-encoded signature (in the curve's wire form returned by
    /// `sign`) against this key's public component, over the same
    /// hex-encoded SHA-256 digest that was signed. Returns `Ok(false)` for a
    /// well-formed signature that doesn't match, `Err` for malformed input.
    pub fn verify(&self, digest_hex: &str, sig_hex: &str) -> Result<bool> {
        let digest = hex::decode(digest_hex)?;
        let sig_bytes = hex::decode(sig_hex)?;
        match self {
            Key::Secp256k1 { public, .. } => {
                let verifying_key = k256::ecdsa::VerifyingKey::from_sec1_bytes(public)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                let sig = k256::ecdsa::Signature::from_slice(&sig_bytes)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                Ok(verifying_key.verify_prehash(&digest, &sig).is_ok())
            }
            Key::P256 { public, .. } => {
                let verifying_key = p256::ecdsa::VerifyingKey::from_sec1_bytes(public)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                let sig = p256::ecdsa::Signature::from_der(&sig_bytes)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                Ok(verifying_key.verify_prehash(&digest, &sig).is_ok())
            }
            Key::Ed25519 { public, .. } => {
                let verifying_key = ed25519_dalek::VerifyingKey::from_bytes(public)
                    .map_err(|e| PlcError::Signature(e.to_string()))?;
                let sig_array: [u8; 64] = sig_bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| PlcError::Signature("ed25519 signature must be 64 bytes".into()))?;
                let sig = ed25519_dalek::Signature::from_bytes(&sig_array);
                Ok(verifying_key.verify(&digest, &sig).is_ok())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digest_hex(payload: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        hex::encode(Sha256::digest(payload))
    }

    #[test]
    fn key_round_trip_all_curves() {
        for curve in [Curve::Secp256k1, Curve::P256, Curve::Ed25519] {
            let key = Key::generate(curve);
            let public_mb = key.encode_public();
            let private_mb = key.encode_private().unwrap();

            let from_pub = Key::from_public(&public_mb).unwrap();
            assert_eq!(from_pub.curve(), curve);
            assert_eq!(from_pub.encode_public(), public_mb);

            let from_priv = Key::from_private(&private_mb).unwrap();
            assert_eq!(from_priv.curve(), curve);
            assert_eq!(from_priv.encode_private().unwrap(), private_mb);
            assert_eq!(from_priv.encode_public(), public_mb);
        }
    }

    #[test]
    fn secp256k1_signature_is_low_s_and_compact() {
        let key = Key::generate(Curve::Secp256k1);
        let digest = digest_hex(b"hello plc");
        let sig_hex = key.sign(&digest).unwrap();
        let sig_bytes = hex::decode(&sig_hex).unwrap();
        assert_eq!(sig_bytes.len(), 64);

        let sig = k256::ecdsa::Signature::from_slice(&sig_bytes).unwrap();
        assert!(sig.normalize_s().is_none(), "signature should already be low-S");
    }

    #[test]
    fn p256_signature_is_der_and_low_s() {
        let key = Key::generate(Curve::P256);
        let digest = digest_hex(b"hello plc");
        let sig_hex = key.sign(&digest).unwrap();
        let sig_bytes = hex::decode(&sig_hex).unwrap();

        let sig = p256::ecdsa::Signature::from_der(&sig_bytes).unwrap();
        assert!(sig.normalize_s().is_none(), "signature should already be low-S");
    }

    #[test]
    fn ed25519_signing_is_deterministic() {
        let key = Key::generate(Curve::Ed25519);
        let digest = digest_hex(b"hello plc");
        assert_eq!(key.sign(&digest).unwrap(), key.sign(&digest).unwrap());
    }

    #[test]
    fn sign_without_private_key_fails() {
        let key = Key::generate(Curve::Ed25519);
        let public_only = Key::from_public(&key.encode_public()).unwrap();
        let digest = digest_hex(b"hello plc");
        assert!(matches!(public_only.sign(&digest), Err(PlcError::NotAPrivateKey)));
    }

    #[test]
    fn verify_succeeds_against_signer_and_fails_against_other_key() {
        for curve in [Curve::Secp256k1, Curve::P256, Curve::Ed25519] {
            let old_key = Key::generate(curve);
            let new_key = Key::generate(curve);
            let digest = digest_hex(b"rotate rotation key");
            let sig_hex = old_key.sign(&digest).unwrap();

            assert!(old_key.verify(&digest, &sig_hex).unwrap());
            assert!(!new_key.verify(&digest, &sig_hex).unwrap());
        }
    }
}
