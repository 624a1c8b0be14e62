//! Key lifecycle: initialization, rotation, revocation, delegation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use trustchain_crypto::{Algorithm, CapabilityProbe, HmacKey, KeyPair, PublicKey};

use crate::error::{SignerError, SignerResult};

/// The active signing material.
enum KeyMaterial {
    /// Local Ed25519 keypair.
    Local(KeyPair),
    /// Symmetric HMAC key (relaxed deployments only).
    Hmac(HmacKey),
    /// Signing is delegated to an external signer; only the identity is
    /// held locally.
    External {
        key_id: String,
        public_key: PublicKey,
    },
}

/// Owns the active signing key and its lifecycle.
///
/// Exactly one `KeyManager` exists per [`Session`](crate::Session);
/// rotation replaces the material atomically.
pub struct KeyManager {
    strict_mode: bool,
    probe: CapabilityProbe,
    material: Option<KeyMaterial>,
    revoked: HashSet<String>,
}

impl KeyManager {
    /// Create an uninitialized manager.
    #[must_use]
    pub fn new(strict_mode: bool) -> Self {
        Self {
            strict_mode,
            probe: CapabilityProbe::run(),
            material: None,
            revoked: HashSet::new(),
        }
    }

    /// Override the capability probe (tests and forced-fallback setups).
    #[must_use]
    pub fn with_probe(mut self, probe: CapabilityProbe) -> Self {
        self.probe = probe;
        self
    }

    /// Generate key material if none exists. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::StrictModeViolation`] when the probe resolves
    /// to the HMAC fallback under strict mode.
    pub fn initialize(&mut self) -> SignerResult<()> {
        if self.material.is_some() {
            return Ok(());
        }

        match self.probe.algorithm() {
            Algorithm::Ed25519 => {
                let keypair = KeyPair::generate();
                info!(key_id = %keypair.key_id(), "generated local ed25519 keypair");
                self.material = Some(KeyMaterial::Local(keypair));
                Ok(())
            },
            Algorithm::HmacSha256 => {
                if self.strict_mode {
                    return Err(SignerError::StrictModeViolation {
                        algorithm: Algorithm::HmacSha256,
                    });
                }
                let key = HmacKey::generate();
                warn!(key_id = %key.key_id(), "ed25519 unavailable, using hmac-sha256 fallback");
                self.material = Some(KeyMaterial::Hmac(key));
                Ok(())
            },
        }
    }

    /// Bind to an external signer's identity.
    ///
    /// Replaces any local material; actual signing is routed to the bridge
    /// by the session.
    pub fn bind_external(&mut self, key_id: String, public_key: PublicKey) {
        info!(key_id = %key_id, "bound to external signer");
        self.material = Some(KeyMaterial::External { key_id, public_key });
    }

    /// Discard the current key and generate a fresh one.
    ///
    /// External bindings are dropped too; the session re-binds on its next
    /// bridge health probe.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`initialize`](Self::initialize).
    pub fn rotate_key(&mut self) -> SignerResult<()> {
        let old = self.key_id();
        self.material = None;
        self.initialize()?;
        info!(old_key_id = ?old, new_key_id = ?self.key_id(), "key rotated");
        Ok(())
    }

    /// Add a key id to the revocation set.
    pub fn revoke(&mut self, key_id: impl Into<String>) {
        let key_id = key_id.into();
        warn!(key_id = %key_id, "key revoked");
        self.revoked.insert(key_id);
    }

    /// Whether a key id is revoked.
    #[must_use]
    pub fn is_revoked(&self, key_id: &str) -> bool {
        self.revoked.contains(key_id)
    }

    /// Whether the *active* key is revoked.
    #[must_use]
    pub fn active_key_revoked(&self) -> bool {
        self.key_id().is_some_and(|id| self.revoked.contains(&id))
    }

    /// Whether key material exists.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.material.is_some()
    }

    /// Whether signing is delegated externally.
    #[must_use]
    pub fn is_external(&self) -> bool {
        matches!(self.material, Some(KeyMaterial::External { .. }))
    }

    /// The active key id, if initialized.
    #[must_use]
    pub fn key_id(&self) -> Option<String> {
        match &self.material {
            Some(KeyMaterial::Local(kp)) => Some(kp.key_id()),
            Some(KeyMaterial::Hmac(key)) => Some(key.key_id()),
            Some(KeyMaterial::External { key_id, .. }) => Some(key_id.clone()),
            None => None,
        }
    }

    /// The active algorithm, if initialized.
    #[must_use]
    pub fn algorithm(&self) -> Option<Algorithm> {
        match &self.material {
            Some(KeyMaterial::Local(_) | KeyMaterial::External { .. }) => Some(Algorithm::Ed25519),
            Some(KeyMaterial::Hmac(_)) => Some(Algorithm::HmacSha256),
            None => None,
        }
    }

    /// The public key, when one exists (asymmetric material only).
    #[must_use]
    pub fn public_key(&self) -> Option<PublicKey> {
        match &self.material {
            Some(KeyMaterial::Local(kp)) => Some(kp.export_public_key()),
            Some(KeyMaterial::External { public_key, .. }) => Some(*public_key),
            _ => None,
        }
    }

    /// Sign with the local material.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::RevokedKey`] for a revoked active key and
    /// [`SignerError::SigningFailure`] when material is missing or
    /// delegation should have been used.
    pub fn sign_local(&self, message: &[u8]) -> SignerResult<Vec<u8>> {
        if self.active_key_revoked() {
            return Err(SignerError::RevokedKey {
                key_id: self.key_id().unwrap_or_default(),
            });
        }
        match &self.material {
            Some(KeyMaterial::Local(kp)) => Ok(kp.sign(message).as_bytes().to_vec()),
            Some(KeyMaterial::Hmac(key)) => Ok(key.sign(message)),
            Some(KeyMaterial::External { .. }) => Err(SignerError::SigningFailure(
                "signing is delegated to the external signer".to_string(),
            )),
            None => Err(SignerError::SigningFailure(
                "key manager is not initialized".to_string(),
            )),
        }
    }

    /// The symmetric key, when the active material is HMAC.
    pub(crate) fn hmac_key(&self) -> Option<&HmacKey> {
        match &self.material {
            Some(KeyMaterial::Hmac(key)) => Some(key),
            _ => None,
        }
    }

    /// Verify an HMAC tag against the local symmetric key.
    ///
    /// Returns `false` when the active material is not symmetric.
    #[must_use]
    pub fn verify_hmac(&self, message: &[u8], tag: &[u8]) -> bool {
        match &self.material {
            Some(KeyMaterial::Hmac(key)) => key.verify(message, tag).is_ok(),
            _ => false,
        }
    }

    /// Snapshot of the key state.
    #[must_use]
    pub fn key_info(&self) -> KeyInfo {
        KeyInfo {
            key_id: self.key_id(),
            algorithm: self.algorithm(),
            external: self.is_external(),
            revoked: self.active_key_revoked(),
        }
    }
}

impl std::fmt::Debug for KeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyManager")
            .field("key_id", &self.key_id())
            .field("strict_mode", &self.strict_mode)
            .field("external", &self.is_external())
            .finish_non_exhaustive()
    }
}

/// Observable key state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    /// Active key id, if initialized.
    pub key_id: Option<String>,
    /// Active algorithm, if initialized.
    pub algorithm: Option<Algorithm>,
    /// Whether signing is delegated to an external signer.
    pub external: bool,
    /// Whether the active key is revoked.
    pub revoked: bool,
}
