//! Envelope verification.
//!
//! Verification is a boolean question, not a fallible operation: a
//! malformed envelope is simply an envelope that does not verify.

use trustchain_core::{ToolArgs, SIGNATURE_SCHEMA_VERSION};
use trustchain_crypto::{canonical_bytes, Algorithm, HmacKey, PublicKey, Signature};

use crate::envelope::{signing_payload, Envelope};

fn major_version(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

/// Check an envelope against a claimed `(tool, args)` pair.
///
/// Rebuilds the canonical signing payload from the envelope's recorded
/// sequence, timestamp, key id, tenant, and execution context, then checks
/// the signature over those exact bytes. HMAC envelopes additionally need
/// the symmetric key that produced them.
///
/// Returns `false` for any mismatch: wrong tool, reordered-but-different
/// arguments, replayed sequence, foreign schema major version, algorithm
/// prefix disagreeing with the declared algorithm, or a signature that
/// simply does not check out.
#[must_use]
pub fn verify_envelope(
    envelope: &Envelope,
    tool: &str,
    args: &ToolArgs,
    hmac: Option<&HmacKey>,
) -> bool {
    if major_version(&envelope.signature_schema_version) != major_version(SIGNATURE_SCHEMA_VERSION)
    {
        return false;
    }
    if envelope.signature.algorithm != envelope.algorithm {
        return false;
    }

    let payload = signing_payload(
        tool,
        args,
        envelope.execution_context.as_ref(),
        &envelope.key_id,
        envelope.sequence,
        &envelope.signature_schema_version,
        envelope.tenant_id.as_ref(),
        &envelope.timestamp,
    );
    let Ok(message) = canonical_bytes(&payload) else {
        return false;
    };

    match envelope.algorithm {
        Algorithm::Ed25519 => {
            let Some(encoded) = envelope.public_key.as_deref() else {
                return false;
            };
            let Ok(public_key) = PublicKey::from_base64(encoded) else {
                return false;
            };
            let Ok(signature) = Signature::try_from_slice(&envelope.signature.bytes) else {
                return false;
            };
            public_key.verify(&message, &signature).is_ok()
        },
        Algorithm::HmacSha256 => match hmac {
            Some(key) => {
                key.key_id() == envelope.key_id
                    && key.verify(&message, &envelope.signature.bytes).is_ok()
            },
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::WireSignature;
    use trustchain_core::{AgentId, Certificate, SessionId, Tier, Timestamp};
    use trustchain_crypto::KeyPair;

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("2.0"), "2");
        assert_eq!(major_version("2.1"), "2");
        assert_eq!(major_version("3"), "3");
    }

    #[test]
    fn test_service_assigned_key_id_verifies() {
        // KMS/HSM signers assign their own key ids; verification binds to
        // the embedded public key, not to an id derivation scheme.
        let keypair = KeyPair::generate();
        let args = ToolArgs::new().with("q", "x");
        let ts = Timestamp::now();
        let key_id = "kms-key-2026-01";

        let payload = signing_payload(
            "search",
            &args,
            None,
            key_id,
            1,
            SIGNATURE_SCHEMA_VERSION,
            None,
            &ts,
        );
        let signature = keypair.sign(&canonical_bytes(&payload).unwrap());

        let envelope = Envelope {
            signature: WireSignature::new(Algorithm::Ed25519, signature.as_bytes().to_vec()),
            nonce: "op_test".to_string(),
            agent_id: AgentId::new("a"),
            session_id: SessionId::new(),
            timestamp: ts,
            user_query: "q".to_string(),
            sequence: 1,
            signature_schema_version: SIGNATURE_SCHEMA_VERSION.to_string(),
            key_id: key_id.to_string(),
            tenant_id: None,
            algorithm: Algorithm::Ed25519,
            public_key: Some(keypair.export_public_key().to_base64()),
            parent_signature: None,
            certificate: Certificate::self_issued("a", Tier::Community),
            decision_context: None,
            execution_context: None,
        };

        assert!(verify_envelope(&envelope, "search", &args, None));

        // The key id still cannot be swapped after the fact: it is part
        // of the signed payload.
        let mut renamed = envelope.clone();
        renamed.key_id = "kms-key-other".to_string();
        assert!(!verify_envelope(&renamed, "search", &args, None));
    }
}
