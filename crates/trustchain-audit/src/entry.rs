//! Audit entry type.

use serde::{Deserialize, Serialize};
use trustchain_core::{SessionId, Timestamp};
use trustchain_crypto::ContentHash;
use uuid::Uuid;

/// One signed tool operation in the audit trail.
///
/// Stores digests of the arguments and contexts rather than the values
/// themselves; the envelope holds the full record, the trail holds the
/// evidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique operation id (`op_<uuid>`), usable as a lookup handle.
    pub nonce: String,
    /// Session this operation belongs to.
    pub session_id: SessionId,
    /// Tool name that was signed.
    pub tool: String,
    /// SHA-256 digest of the raw (canonical) arguments.
    pub args_hash: ContentHash,
    /// The algorithm-prefixed signature string (`<algorithm>:<base64>`).
    pub signature: String,
    /// When the operation was signed.
    pub timestamp: Timestamp,
    /// Per-session sequence number (1-based).
    pub sequence: u64,
    /// Id of the key that signed.
    pub key_id: String,
    /// Signature of the previous operation (chain-of-custody tiers only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_signature: Option<String>,
    /// Digest of the decision context, if one was attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision_context_hash: Option<ContentHash>,
    /// Digest of the execution context, if one was attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_context_hash: Option<ContentHash>,
}

impl AuditEntry {
    /// Generate a fresh operation nonce.
    #[must_use]
    pub fn new_nonce() -> String {
        format!("op_{}", Uuid::new_v4())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_format() {
        let nonce = AuditEntry::new_nonce();
        assert!(nonce.starts_with("op_"));
        assert_ne!(nonce, AuditEntry::new_nonce());
    }

    #[test]
    fn test_entry_serde_omits_empty_options() {
        let entry = AuditEntry {
            nonce: AuditEntry::new_nonce(),
            session_id: SessionId::new(),
            tool: "list_tasks".to_string(),
            args_hash: ContentHash::hash(b"{}"),
            signature: "ed25519:AAAA".to_string(),
            timestamp: Timestamp::now(),
            sequence: 1,
            key_id: "abc123".to_string(),
            parent_signature: None,
            decision_context_hash: None,
            execution_context_hash: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        assert!(!json.contains("parent_signature"));
        assert!(!json.contains("decision_context_hash"));
    }
}
