//! DID manager state machine.
//!
//! Proposed -> Active -> Deactivated. The manager never holds state itself;
//! the directory is the authoritative log, the key store the authoritative
//! local cache, so every operation here re-derives what it needs from
//! those two collaborators.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::codec::Curve;
use crate::directory::Directory;
use crate::error::{PlcError, Result};
use crate::identity::did;
use crate::key::Key;
use crate::keystore::{KeyMaterial, KeyRecord, KeyStore};
use crate::operation::{Operation, Service, SignedOperation, Tombstone};

pub struct CreateResult {
    pub did: String,
    pub rotation_key: Key,
    pub verification_key: Key,
    pub handle: Option<String>,
    pub service_endpoint: Option<String>,
}

/// `changes` passed to `update`: a subset of `{handle, service}`. A field
/// left `None` is left untouched on the existing operation.
#[derive(Default)]
pub struct UpdateChanges {
    pub handle: Option<String>,
    pub service_endpoint: Option<String>,
}

#[derive(Debug)]
pub struct RotateResult {
    pub did: String,
    pub rotation_key: Key,
    pub verification_key: Key,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeactivationMode {
    Tombstoned,
    SoftDeactivated,
}

pub struct DeactivateResult {
    pub did: String,
    pub mode: DeactivationMode,
}

const ATPROTO_PDS: &str = "atproto_pds";
const ATPROTO_PDS_TYPE: &str = "AtprotoPersonalDataServer";

fn verification_method_id(verification_key: &Key) -> String {
    let digest = Sha256::digest(verification_key.encode_public().as_bytes());
    format!("fair_{}", &hex::encode(digest)[..6])
}

pub struct DidManager<D: Directory, K: KeyStore> {
    directory: D,
    keystore: K,
}

impl<D: Directory, K: KeyStore> DidManager<D, K> {
    pub fn new(directory: D, keystore: K) -> Self {
        Self { directory, keystore }
    }

    async fn local_rotation_key(&self, did: &str) -> Result<(KeyRecord, Key)> {
        let record = self
            .keystore
            .get(did)
            .await?
            .ok_or_else(|| PlcError::MissingLocalKey(did.to_string()))?;
        let rotation_key = Key::from_private(&record.rotation_key.private)?;
        Ok((record, rotation_key))
    }

    async fn current_head(&self, did: &str) -> Result<(String, Operation)> {
        let last = self
            .directory
            .get_last_operation(did)
            .await?
            .ok_or_else(|| PlcError::DirectoryError {
                status: 404,
                message: format!("no operations found for {did}"),
            })?;
        let op = Operation::from_wire(&last.operation)?;
        Ok((last.cid, op))
    }

    /// Build the genesis operation, sign it, submit it, and persist both
    /// generated keys. Rotation key is secp256k1, verification key Ed25519.
    pub async fn create(&self, handle: Option<String>, service_endpoint: Option<String>) -> Result<CreateResult> {
        let rotation_key = Key::generate(Curve::Secp256k1);
        let verification_key = Key::generate(Curve::Ed25519);

        let also_known_as = handle.as_ref().map(|h| vec![format!("at://{h}")]).unwrap_or_default();
        let mut services = BTreeMap::new();
        if let Some(endpoint) = &service_endpoint {
            services.insert(
                ATPROTO_PDS.to_string(),
                Service { type_: ATPROTO_PDS_TYPE.to_string(), endpoint: endpoint.clone() },
            );
        }
        let mut verification_methods = BTreeMap::new();
        verification_methods.insert(verification_method_id(&verification_key), verification_key.clone());

        let genesis = Operation {
            rotation_keys: vec![rotation_key.clone()],
            verification_methods,
            also_known_as,
            services,
            prev: None,
        };
        genesis.validate(false)?;

        let signed = genesis.sign(&rotation_key)?;
        let did_value = did::derive_did(&signed)?;

        self.directory.create_did(&signed.to_wire()).await?;

        let now = chrono::Utc::now();
        self.keystore
            .put(KeyRecord {
                did: did_value.clone(),
                rotation_key: KeyMaterial {
                    private: rotation_key.encode_private()?,
                    public: rotation_key.encode_public(),
                },
                verification_key: KeyMaterial {
                    private: verification_key.encode_private()?,
                    public: verification_key.encode_public(),
                },
                type_: None,
                active: true,
                created_at: now,
                updated_at: now,
                deactivated_at: None,
                metadata: serde_json::json!({}),
            })
            .await?;

        Ok(CreateResult {
            did: did_value,
            rotation_key,
            verification_key,
            handle,
            service_endpoint,
        })
    }

    /// Apply a subset of `{handle, service}` to the current head and submit
    /// the resulting operation, signed by the locally-held rotation key
    /// Returns the new head's CID.
    pub async fn update(&self, did: &str, changes: UpdateChanges) -> Result<String> {
        let (_record, rotation_key) = self.local_rotation_key(did).await?;
        let (last_cid, mut op) = self.current_head(did).await?;

        if let Some(handle) = changes.handle {
            op.also_known_as = vec![format!("at://{handle}")];
        }
        if let Some(endpoint) = changes.service_endpoint {
            op.services.insert(
                ATPROTO_PDS.to_string(),
                Service { type_: ATPROTO_PDS_TYPE.to_string(), endpoint },
            );
        }
        op.prev = Some(last_cid);
        op.validate(false)?;

        let signed = op.sign(&rotation_key)?;
        self.directory.update_did(did, &signed.to_wire()).await?;
        did::cid(&signed)
    }

    /// Replace both rotation and verification keys. The new operation is
    /// signed with the *outgoing* rotation key: the invariant that keeps a
    /// compromised holder from bootstrapping out of the existing trust
    /// chain.
    pub async fn rotate_keys(&self, did: &str, reason: Option<String>) -> Result<RotateResult> {
        let (record, old_rotation_key) = self.local_rotation_key(did).await?;
        let (last_cid, current_op) = self.current_head(did).await?;

        let new_rotation_key = Key::generate(Curve::Secp256k1);
        let new_verification_key = Key::generate(Curve::Ed25519);
        let mut verification_methods = BTreeMap::new();
        verification_methods.insert(verification_method_id(&new_verification_key), new_verification_key.clone());

        let op = Operation {
            rotation_keys: vec![new_rotation_key.clone()],
            verification_methods,
            also_known_as: current_op.also_known_as,
            services: current_op.services,
            prev: Some(last_cid),
        };
        op.validate(false)?;

        let signed = op.sign(&old_rotation_key)?;
        self.directory.update_did(did, &signed.to_wire()).await?;

        self.keystore
            .update_keys(
                did,
                KeyMaterial {
                    private: new_rotation_key.encode_private()?,
                    public: new_rotation_key.encode_public(),
                },
                KeyMaterial {
                    private: new_verification_key.encode_private()?,
                    public: new_verification_key.encode_public(),
                },
            )
            .await?;

        if let Some(reason) = reason {
            let mut metadata = record.metadata;
            metadata["lastRotationReason"] = serde_json::Value::String(reason);
            self.keystore.update_metadata(did, metadata).await?;
        }

        Ok(RotateResult { did: did.to_string(), rotation_key: new_rotation_key, verification_key: new_verification_key })
    }

    /// Attempt a tombstone; on directory rejection, fall back to a soft
    /// deactivation (an operation with every field emptied). Both paths mark
    /// the local record deactivated.
    pub async fn deactivate(&self, did: &str) -> Result<DeactivateResult> {
        let (_record, rotation_key) = self.local_rotation_key(did).await?;
        let (last_cid, _current_op) = self.current_head(did).await?;

        let tombstone = Tombstone::sign(last_cid.clone(), &rotation_key)?;
        match self.directory.update_did(did, &tombstone.to_wire()).await {
            Ok(_) => {
                self.keystore.deactivate(did).await?;
                Ok(DeactivateResult { did: did.to_string(), mode: DeactivationMode::Tombstoned })
            }
            Err(PlcError::DirectoryError { .. }) => {
                let soft = Operation {
                    rotation_keys: vec![],
                    verification_methods: BTreeMap::new(),
                    also_known_as: vec![],
                    services: BTreeMap::new(),
                    prev: Some(last_cid),
                };
                soft.validate(true)?;
                let signed = soft.sign(&rotation_key)?;
                self.directory.update_did(did, &signed.to_wire()).await?;
                self.keystore.deactivate(did).await?;
                Ok(DeactivateResult { did: did.to_string(), mode: DeactivationMode::SoftDeactivated })
            }
            Err(other) => Err(other),
        }
    }
}
