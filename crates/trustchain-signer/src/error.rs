//! Signing error types.

use thiserror::Error;
use trustchain_crypto::{Algorithm, CryptoError};

/// Errors from signing and key management.
#[derive(Debug, Error)]
pub enum SignerError {
    /// Canonicalization or key-material error.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// No session has been started.
    #[error("no active session: call start_session first")]
    SessionNotStarted,

    /// The active key id is revoked; rotate before signing again.
    #[error("key {key_id} is revoked; rotate the key to continue signing")]
    RevokedKey {
        /// The revoked key id.
        key_id: String,
    },

    /// Strict mode forbids the resolved algorithm.
    #[error("strict mode requires ed25519, but the active algorithm is {algorithm}")]
    StrictModeViolation {
        /// The algorithm that was refused.
        algorithm: Algorithm,
    },

    /// The external signer did not answer within its timeout.
    #[error("external signer timed out after {timeout_ms}ms")]
    ExternalSignerTimeout {
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The external signer answered with an error or malformed response.
    #[error("external signer failure: {0}")]
    ExternalSignerFailure(String),

    /// Local signing failed (key unavailable or wrong material kind).
    #[error("signing failure: {0}")]
    SigningFailure(String),
}

/// Result type for signing operations.
pub type SignerResult<T> = Result<T, SignerError>;
