//! Audit error types.

use thiserror::Error;

/// Errors from the audit trail.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Serialization of an entry or report failed.
    #[error("serialization error: {0}")]
    SerializationError(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
