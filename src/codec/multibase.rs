//! Multibase / multicodec encoding for PLC key material and CIDs.
//!
//! Byte shuffling is delegated to `bs58` and `base32`; the multibase prefix
//! and multicodec tag handling is ours.

use crate::error::{PlcError, Result};

/// Curve a multicodec tag names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    Secp256k1,
    P256,
    Ed25519,
}

const SECP256K1_PUB: [u8; 2] = [0xe7, 0x01];
const SECP256K1_PRIV: [u8; 2] = [0x81, 0x26];
const P256_PUB: [u8; 2] = [0x80, 0x24];
const P256_PRIV: [u8; 2] = [0x06, 0x26];
const ED25519_PUB: [u8; 2] = [0xed, 0x01];
const ED25519_PRIV: [u8; 2] = [0x80, 0x26];

fn tag_for(curve: Curve, private: bool) -> [u8; 2] {
    match (curve, private) {
        (Curve::Secp256k1, false) => SECP256K1_PUB,
        (Curve::Secp256k1, true) => SECP256K1_PRIV,
        (Curve::P256, false) => P256_PUB,
        (Curve::P256, true) => P256_PRIV,
        (Curve::Ed25519, false) => ED25519_PUB,
        (Curve::Ed25519, true) => ED25519_PRIV,
    }
}

/// Result of decoding a multicodec tag: which curve, and whether the legacy
/// acceptance path fired (a public-key tag decoded as private material).
struct DecodedTag {
    curve: Curve,
    is_private: bool,
    legacy: bool,
}

fn decode_tag(tag: [u8; 2], want_private: bool) -> Result<DecodedTag> {
    let (curve, is_private) = match tag {
        SECP256K1_PUB => (Curve::Secp256k1, false),
        SECP256K1_PRIV => (Curve::Secp256k1, true),
        P256_PUB => (Curve::P256, false),
        P256_PRIV => (Curve::P256, true),
        ED25519_PUB => (Curve::Ed25519, false),
        ED25519_PRIV => (Curve::Ed25519, true),
        other => {
            let code = u16::from_be_bytes(other);
            return Err(PlcError::UnsupportedCurve(code));
        }
    };

    // Legacy acceptance: a public tag decoded while a private key was
    // requested is treated as that curve's private key.
    if want_private && !is_private {
        return Ok(DecodedTag { curve, is_private: true, legacy: true });
    }

    Ok(DecodedTag { curve, is_private, legacy: false })
}

/// base58btc encode with multibase `z` prefix and leading-zero preservation.
pub fn base58btc_encode(data: &[u8]) -> String {
    let leading_zeros = data.iter().take_while(|&&b| b == 0).count();
    let mut out = String::with_capacity(1 + leading_zeros + data.len());
    out.push('z');
    out.push_str(&"1".repeat(leading_zeros));
    out.push_str(&bs58::encode(data).into_string());
    out
}

/// base58btc decode, expecting the multibase `z` prefix.
pub fn base58btc_decode(s: &str) -> Result<Vec<u8>> {
    let body = s
        .strip_prefix('z')
        .ok_or_else(|| PlcError::MalformedMultibase("missing 'z' multibase prefix".into()))?;
    let leading_ones = body.chars().take_while(|&c| c == '1').count();
    let rest = &body[leading_ones..];
    let mut decoded = bs58::decode(rest)
        .into_vec()
        .map_err(|e| PlcError::MalformedMultibase(format!("base58btc decode failed: {e}")))?;
    let mut out = vec![0u8; leading_ones];
    out.append(&mut decoded);
    Ok(out)
}

/// RFC 4648 base32, lowercase, no padding, with multibase `b` prefix.
pub fn base32_encode(data: &[u8]) -> String {
    let body = base32::encode(base32::Alphabet::RFC4648 { padding: false }, data).to_lowercase();
    format!("b{body}")
}

/// base32 decode, expecting the multibase `b` prefix.
pub fn base32_decode(s: &str) -> Result<Vec<u8>> {
    let body = s
        .strip_prefix('b')
        .ok_or_else(|| PlcError::MalformedMultibase("missing 'b' multibase prefix".into()))?;
    base32::decode(base32::Alphabet::RFC4648 { padding: false }, &body.to_uppercase())
        .ok_or_else(|| PlcError::MalformedMultibase("base32 decode failed".into()))
}

/// Encode a public or private key's raw bytes as a multibase/multicodec
/// string: `tag || raw_key_bytes`, base58btc-encoded, `z`-prefixed.
pub fn encode_key(curve: Curve, private: bool, raw: &[u8]) -> String {
    let tag = tag_for(curve, private);
    let mut buf = Vec::with_capacity(2 + raw.len());
    buf.extend_from_slice(&tag);
    buf.extend_from_slice(raw);
    base58btc_encode(&buf)
}

/// Decode a multibase key string, returning the curve, whether the legacy
/// public-tag-as-private path fired, and the raw key bytes.
pub fn decode_key(mbstr: &str, want_private: bool) -> Result<(Curve, bool, Vec<u8>)> {
    let bytes = base58btc_decode(mbstr)?;
    if bytes.len() < 2 {
        return Err(PlcError::MalformedMultibase("key too short for multicodec tag".into()));
    }
    let tag = [bytes[0], bytes[1]];
    let decoded = decode_tag(tag, want_private)?;
    Ok((decoded.curve, decoded.legacy, bytes[2..].to_vec()))
}
