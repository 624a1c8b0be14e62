//! HMAC-SHA256 symmetric signing.
//!
//! Fallback scheme for relaxed deployments where Ed25519 is unavailable.
//! Strict-mode sessions refuse to use it; envelopes signed this way are
//! only verifiable by a holder of the same key.

use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use zeroize::ZeroizeOnDrop;

use crate::error::{CryptoError, CryptoResult};
use crate::keypair::derive_key_id;

type HmacSha256 = Hmac<Sha256>;

/// A symmetric HMAC-SHA256 key (32 bytes), zeroized on drop.
#[derive(ZeroizeOnDrop)]
pub struct HmacKey([u8; 32]);

impl HmacKey {
    /// Generate a new random key.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyLength`] if the slice is not exactly 32 bytes.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; 32];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Stable key id.
    ///
    /// Derived from the key material itself; there is no public half to
    /// derive from.
    #[must_use]
    pub fn key_id(&self) -> String {
        derive_key_id(&self.0)
    }

    /// Compute the HMAC tag for a message (32 bytes).
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(message);
        mac.finalize().into_bytes().to_vec()
    }

    /// Verify an HMAC tag in constant time.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::SignatureVerificationFailed`] on mismatch.
    pub fn verify(&self, message: &[u8], tag: &[u8]) -> CryptoResult<()> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .unwrap_or_else(|_| unreachable!("HMAC accepts any key length"));
        mac.update(message);
        mac.verify_slice(tag)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }
}

impl std::fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacKey")
            .field("key_id", &self.key_id())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify() {
        let key = HmacKey::generate();
        let tag = key.sign(b"message");
        assert!(key.verify(b"message", &tag).is_ok());
        assert!(key.verify(b"other", &tag).is_err());
    }

    #[test]
    fn test_different_keys_different_tags() {
        let a = HmacKey::generate();
        let b = HmacKey::generate();
        let tag = a.sign(b"message");
        assert!(b.verify(b"message", &tag).is_err());
    }

    #[test]
    fn test_key_id_stable() {
        let key = HmacKey::generate();
        assert_eq!(key.key_id(), key.key_id());
        assert_eq!(key.key_id().len(), 24);
    }

    #[test]
    fn test_from_bytes_length_check() {
        assert!(HmacKey::from_bytes(&[0u8; 16]).is_err());
        assert!(HmacKey::from_bytes(&[0u8; 32]).is_ok());
    }
}
