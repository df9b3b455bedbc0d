pub mod codec;
pub mod config;
pub mod directory;
pub mod error;
pub mod identity;
pub mod key;
pub mod keystore;
pub mod operation;

pub use directory::{Directory, HttpDirectory};
pub use error::{PlcError, Result};
pub use identity::{CreateResult, DeactivateResult, DeactivationMode, DidManager, RotateResult, UpdateChanges};
pub use key::Key;
pub use keystore::{FileKeyStore, KeyMaterial, KeyRecord, KeyStore};
pub use operation::{Operation, Service, Signed, SignedOperation, Tombstone};
