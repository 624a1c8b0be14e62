//! Policy error types.

use thiserror::Error;

/// Errors from the trust registry and policy evaluation.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// Registry file I/O failed.
    #[error("registry storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Registry (de)serialization failed.
    #[error("registry serialization error: {0}")]
    SerializationError(String),

    /// The trust authority did not answer within its timeout.
    #[error("registry sync timed out after {timeout_ms}ms")]
    SyncTimeout {
        /// Configured timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The trust authority answered with an error or malformed body.
    #[error("registry sync failure: {0}")]
    SyncFailure(String),

    /// The server id is not on the local-bootstrap allow list.
    #[error("server {server_id} is not eligible for local bootstrap")]
    BootstrapNotAllowed {
        /// The rejected server id.
        server_id: String,
    },
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
