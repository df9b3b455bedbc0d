use thiserror::Error;

/// Sub-reason for [`PlcError::InvalidOperation`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidOperationReason {
    #[error("operation type is empty")]
    EmptyType,
    #[error("operation type must be plc_operation or plc_tombstone")]
    InvalidType,
    #[error("rotationKeys must not be empty")]
    EmptyRotationKeys,
    #[error("verificationMethods must not be empty")]
    EmptyVerificationMethods,
    #[error("key material is not well-formed")]
    InvalidKeyMaterial,
}

#[derive(Error, Debug)]
pub enum PlcError {
    #[error("unsupported multicodec tag: {0:#06x}")]
    UnsupportedCurve(u16),

    #[error("malformed multibase string: {0}")]
    MalformedMultibase(String),

    #[error("key is public-only; private-key operation attempted")]
    NotAPrivateKey,

    #[error("invalid operation: {0}")]
    InvalidOperation(InvalidOperationReason),

    #[error("DAG-CBOR encoding failed: {0}")]
    CborEncodingError(String),

    #[error("PLC directory error (status {status}): {message}")]
    DirectoryError { status: u16, message: String },

    #[error("no local rotation key found for {0}")]
    MissingLocalKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("signature error: {0}")]
    Signature(String),
}

impl From<ed25519_dalek::SignatureError> for PlcError {
    fn from(err: ed25519_dalek::SignatureError) -> Self {
        PlcError::Signature(err.to_string())
    }
}

/// A transport failure (timeout, DNS, connection reset) never reached a
/// directory that could issue its own status code, so it is reported as
/// `DirectoryError` with a sentinel `status: 0` rather than a separate
/// variant, keeping one failure path for callers like
/// [`crate::identity::DidManager::deactivate`] to match on.
impl From<reqwest::Error> for PlcError {
    fn from(err: reqwest::Error) -> Self {
        PlcError::DirectoryError { status: 0, message: err.to_string() }
    }
}

impl From<hex::FromHexError> for PlcError {
    fn from(err: hex::FromHexError) -> Self {
        PlcError::MalformedMultibase(format!("invalid hex: {err}"))
    }
}

impl From<base64::DecodeError> for PlcError {
    fn from(err: base64::DecodeError) -> Self {
        PlcError::MalformedMultibase(format!("invalid base64: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, PlcError>;
