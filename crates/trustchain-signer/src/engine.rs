//! The caller-owned signing session.
//!
//! A [`Session`] owns everything signing needs: the key manager, the
//! optional external-signer bridge, the audit trail, and the per-session
//! replay state (sequence counter and last signature). It is `&mut self`
//! throughout, so sequence reservation is race-free by construction.

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};
use trustchain_audit::{AuditEntry, AuditTrail, ComplianceReport};
use trustchain_core::{
    AgentId, Certificate, ExecutionContext, SessionId, Timestamp, ToolArgs, TrustChainConfig,
    SIGNATURE_SCHEMA_VERSION,
};
use trustchain_crypto::{canonical_bytes, ContentHash, PublicKey};

use crate::bridge::{ExternalSignerBridge, SignerHealth};
use crate::envelope::{signing_payload, Envelope, WireSignature};
use crate::error::{SignerError, SignerResult};
use crate::keymanager::{KeyInfo, KeyManager};
use crate::verify::verify_envelope;

/// Pseudo-tool name for the final-response attestation envelope.
pub const FINAL_RESPONSE_TOOL: &str = "__final_response__";

/// Replay state, reset by [`Session::start_session`].
struct SessionState {
    session_id: SessionId,
    user_query: String,
    sequence: u64,
    last_signature: Option<String>,
    started_at: Timestamp,
}

/// Summary of a session, for operators and tests.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    /// The session's id.
    pub session_id: SessionId,
    /// The agent running it.
    pub agent_id: AgentId,
    /// The user request the session serves.
    pub user_query: String,
    /// When the session started.
    pub started_at: Timestamp,
    /// Number of operations signed so far.
    pub operations: usize,
    /// Highest sequence number issued.
    pub sequence: u64,
    /// Whether the recorded chain links all check out.
    pub chain_integrity: bool,
}

/// A signing session for one agent.
pub struct Session {
    config: TrustChainConfig,
    agent_id: AgentId,
    certificate: Certificate,
    keys: KeyManager,
    bridge: Option<ExternalSignerBridge>,
    trail: AuditTrail,
    execution_context: Option<ExecutionContext>,
    state: Option<SessionState>,
}

impl Session {
    /// Create a session engine for an agent.
    ///
    /// Key material is generated lazily on the first `sign`; a configured
    /// external signer is probed lazily too.
    #[must_use]
    pub fn new(config: TrustChainConfig, agent_id: AgentId) -> Self {
        let bridge = config.external_signer.clone().and_then(|signer| {
            match ExternalSignerBridge::new(signer) {
                Ok(bridge) => Some(bridge),
                Err(e) => {
                    warn!(error = %e, "external signer bridge unavailable, staying local");
                    None
                },
            }
        });
        let certificate = Certificate::self_issued(agent_id.to_string(), config.tier);
        let keys = KeyManager::new(config.strict_mode);
        Self {
            config,
            agent_id,
            certificate,
            keys,
            bridge,
            trail: AuditTrail::new(),
            execution_context: None,
            state: None,
        }
    }

    /// Attach an execution context, embedded in every signed payload.
    #[must_use]
    pub fn with_execution_context(mut self, context: ExecutionContext) -> Self {
        self.execution_context = Some(context);
        self
    }

    /// Start a new session for a user request.
    ///
    /// Resets the sequence counter, drops the chain tail, and clears the
    /// audit trail.
    pub fn start_session(&mut self, user_query: impl Into<String>) -> SessionId {
        let session_id = SessionId::new();
        info!(session_id = %session_id, agent_id = %self.agent_id, "session started");
        self.trail.clear();
        self.state = Some(SessionState {
            session_id: session_id.clone(),
            user_query: user_query.into(),
            sequence: 0,
            last_signature: None,
            started_at: Timestamp::now(),
        });
        session_id
    }

    /// End the active session, returning its final summary.
    ///
    /// The audit trail survives until the next `start_session`, so evidence
    /// remains inspectable after the fact.
    pub fn end_session(&mut self) -> Option<SessionInfo> {
        let info = self.session_info();
        if let Some(state) = self.state.take() {
            info!(
                session_id = %state.session_id,
                operations = self.trail.len(),
                "session ended"
            );
        }
        info
    }

    /// Summary of the active session, if one exists.
    #[must_use]
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.state.as_ref().map(|state| SessionInfo {
            session_id: state.session_id.clone(),
            agent_id: self.agent_id.clone(),
            user_query: state.user_query.clone(),
            started_at: state.started_at,
            operations: self.trail.len(),
            sequence: state.sequence,
            chain_integrity: self.trail.chain_integrity(),
        })
    }

    /// Sign a tool invocation.
    ///
    /// # Errors
    ///
    /// [`SignerError::SessionNotStarted`] without an active session,
    /// [`SignerError::RevokedKey`] for a revoked active key,
    /// [`SignerError::StrictModeViolation`] when strict mode cannot get
    /// Ed25519, plus canonicalization and external-signer failures. On any
    /// failure the reserved sequence number is released, so the next
    /// successful `sign` reuses it.
    pub async fn sign(&mut self, tool: &str, args: &ToolArgs) -> SignerResult<Envelope> {
        self.sign_with_context(tool, args, None).await
    }

    /// Sign a tool invocation with an attached decision context.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`sign`](Self::sign).
    pub async fn sign_with_context(
        &mut self,
        tool: &str,
        args: &ToolArgs,
        decision_context: Option<Value>,
    ) -> SignerResult<Envelope> {
        if self.state.is_none() {
            return Err(SignerError::SessionNotStarted);
        }

        self.keys.initialize()?;
        self.maybe_bind_external().await;

        if self.keys.active_key_revoked() {
            return Err(SignerError::RevokedKey {
                key_id: self.keys.key_id().unwrap_or_default(),
            });
        }
        let key_id = self
            .keys
            .key_id()
            .ok_or_else(|| SignerError::SigningFailure("no key material".to_string()))?;
        let algorithm = self
            .keys
            .algorithm()
            .ok_or_else(|| SignerError::SigningFailure("no key material".to_string()))?;

        // Reserve the sequence number before any suspension point; replay
        // protection depends on no two envelopes observing the same one.
        let (session_id, user_query, sequence, parent_signature) = {
            let state = self
                .state
                .as_mut()
                .ok_or(SignerError::SessionNotStarted)?;
            state.sequence += 1;
            let parent = if self.certificate.tier.chain_of_custody() {
                state.last_signature.clone()
            } else {
                None
            };
            (
                state.session_id.clone(),
                state.user_query.clone(),
                state.sequence,
                parent,
            )
        };

        let timestamp = Timestamp::now();
        let tenant_id = self
            .execution_context
            .as_ref()
            .and_then(|ctx| ctx.tenant_id.clone());
        let payload = signing_payload(
            tool,
            args,
            self.execution_context.as_ref(),
            &key_id,
            sequence,
            SIGNATURE_SCHEMA_VERSION,
            tenant_id.as_ref(),
            &timestamp,
        );

        let signed = self
            .digest_and_sign(&payload, args, decision_context.as_ref())
            .await;
        let (raw, args_hash, decision_context_hash, execution_context_hash) = match signed {
            Ok(parts) => parts,
            Err(e) => {
                // The reserved number was never emitted; give it back.
                if let Some(state) = self.state.as_mut() {
                    state.sequence -= 1;
                }
                return Err(e);
            },
        };

        let wire = WireSignature::new(algorithm, raw);
        let signature_string = wire.to_string();
        if let Some(state) = self.state.as_mut() {
            state.last_signature = Some(signature_string.clone());
        }

        let nonce = AuditEntry::new_nonce();
        self.trail.append(AuditEntry {
            nonce: nonce.clone(),
            session_id: session_id.clone(),
            tool: tool.to_string(),
            args_hash,
            signature: signature_string,
            timestamp,
            sequence,
            key_id: key_id.clone(),
            parent_signature: parent_signature.clone(),
            decision_context_hash,
            execution_context_hash,
        });

        Ok(Envelope {
            signature: wire,
            nonce,
            agent_id: self.agent_id.clone(),
            session_id,
            timestamp,
            user_query,
            sequence,
            signature_schema_version: SIGNATURE_SCHEMA_VERSION.to_string(),
            key_id,
            tenant_id,
            algorithm,
            public_key: self.keys.public_key().map(|pk| pk.to_base64()),
            parent_signature,
            certificate: self.certificate.clone(),
            decision_context,
            execution_context: self.execution_context.clone(),
        })
    }

    /// Sign the final text response, binding it to a digest of the sorted
    /// set of tool signatures it rests on. An optional extra context
    /// travels as the decision context of the pseudo-call.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`sign`](Self::sign).
    pub async fn sign_final_response(
        &mut self,
        response: &str,
        tool_signatures: &[String],
        extra_context: Option<Value>,
    ) -> SignerResult<Envelope> {
        let mut signatures = tool_signatures.to_vec();
        signatures.sort();
        let args = ToolArgs::new()
            .with(
                "response_hash",
                ContentHash::hash(response.as_bytes()).to_hex(),
            )
            .with(
                "tool_signatures_hash",
                ContentHash::hash(signatures.join("\n").as_bytes()).to_hex(),
            );
        self.sign_with_context(FINAL_RESPONSE_TOOL, &args, extra_context)
            .await
    }

    /// Check an envelope against a claimed `(tool, args)` pair.
    #[must_use]
    pub fn verify(&self, envelope: &Envelope, tool: &str, args: &ToolArgs) -> bool {
        verify_envelope(envelope, tool, args, self.keys.hmac_key())
    }

    /// Rotate the active key.
    ///
    /// # Errors
    ///
    /// Same failure modes as key initialization.
    pub fn rotate_key(&mut self) -> SignerResult<()> {
        self.keys.rotate_key()
    }

    /// Revoke a key id.
    pub fn revoke_key(&mut self, key_id: impl Into<String>) {
        self.keys.revoke(key_id);
    }

    /// Observable key state.
    #[must_use]
    pub fn key_info(&self) -> KeyInfo {
        self.keys.key_info()
    }

    /// The audit trail of the current session.
    #[must_use]
    pub fn trail(&self) -> &AuditTrail {
        &self.trail
    }

    /// The embedded certificate.
    #[must_use]
    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// The session configuration.
    #[must_use]
    pub fn config(&self) -> &TrustChainConfig {
        &self.config
    }

    /// Export a compliance report (enterprise tier only).
    #[must_use]
    pub fn compliance_report(&self) -> Option<ComplianceReport> {
        self.trail.export_compliance_report(&self.certificate)
    }

    /// Last observed external-signer health, if a bridge is configured.
    #[must_use]
    pub fn signer_health(&self) -> Option<&SignerHealth> {
        self.bridge.as_ref().map(ExternalSignerBridge::health)
    }

    /// Probe the bridge and adopt its identity when it is usable and
    /// advertises full key material. A signer without key material is
    /// ignored; signing stays local.
    async fn maybe_bind_external(&mut self) {
        if self.keys.is_external() {
            return;
        }
        let Some(bridge) = self.bridge.as_mut() else {
            return;
        };
        let health = bridge.health_check().await;
        if !health.usable() {
            return;
        }
        let (Some(key_id), Some(encoded)) = (health.key_id.clone(), health.public_key.clone())
        else {
            return;
        };
        match PublicKey::from_base64(&encoded) {
            Ok(public_key) => self.keys.bind_external(key_id, public_key),
            Err(e) => warn!(error = %e, "external signer public key unusable, staying local"),
        }
    }

    /// Canonicalize, digest, and sign. All fallible work between sequence
    /// reservation and trail append happens here, so the caller has one
    /// place to roll back.
    async fn digest_and_sign(
        &mut self,
        payload: &Value,
        args: &ToolArgs,
        decision_context: Option<&Value>,
    ) -> SignerResult<(
        Vec<u8>,
        ContentHash,
        Option<ContentHash>,
        Option<ContentHash>,
    )> {
        let message = canonical_bytes(payload)?;
        let args_hash = ContentHash::hash(&canonical_bytes(&args.to_value())?);
        let decision_context_hash = match decision_context {
            Some(ctx) => Some(ContentHash::hash(&canonical_bytes(ctx)?)),
            None => None,
        };
        let execution_context_hash = match &self.execution_context {
            Some(ctx) => {
                let value = serde_json::to_value(ctx)
                    .map_err(|e| SignerError::SigningFailure(e.to_string()))?;
                Some(ContentHash::hash(&canonical_bytes(&value)?))
            },
            None => None,
        };

        let raw = if self.keys.is_external() {
            match self.bridge.as_mut() {
                Some(bridge) => bridge.sign(&message).await?,
                None => {
                    return Err(SignerError::SigningFailure(
                        "external key bound without a bridge".to_string(),
                    ))
                },
            }
        } else {
            self.keys.sign_local(&message)?
        };
        Ok((raw, args_hash, decision_context_hash, execution_context_hash))
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("agent_id", &self.agent_id)
            .field("tier", &self.certificate.tier)
            .field("active", &self.state.is_some())
            .field("operations", &self.trail.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trustchain_core::Tier;
    use trustchain_crypto::{Algorithm, HmacKey};

    fn session(tier: Tier) -> Session {
        Session::new(
            TrustChainConfig::new().with_tier(tier),
            AgentId::new("agent-test"),
        )
    }

    #[tokio::test]
    async fn test_sign_verify_roundtrip() {
        let mut s = session(Tier::Community);
        s.start_session("list my tasks");

        let args = ToolArgs::new().with("limit", 10);
        let envelope = s.sign("list_tasks", &args).await.unwrap();

        assert_eq!(envelope.sequence, 1);
        assert_eq!(envelope.algorithm, Algorithm::Ed25519);
        assert!(envelope.public_key.is_some());
        assert!(s.verify(&envelope, "list_tasks", &args));
    }

    #[tokio::test]
    async fn test_verify_rejects_tamper() {
        let mut s = session(Tier::Community);
        s.start_session("q");

        let args = ToolArgs::new().with("id", 7);
        let envelope = s.sign("delete_task", &args).await.unwrap();

        // Different tool, different args, replayed sequence: all rejected.
        assert!(!s.verify(&envelope, "list_tasks", &args));
        assert!(!s.verify(&envelope, "delete_task", &ToolArgs::new().with("id", 8)));
        let mut replayed = envelope.clone();
        replayed.sequence = 2;
        assert!(!s.verify(&replayed, "delete_task", &args));
    }

    #[tokio::test]
    async fn test_sequence_strictly_increasing() {
        let mut s = session(Tier::Community);
        s.start_session("q");

        for expected in 1..=5u64 {
            let env = s.sign("tool", &ToolArgs::new()).await.unwrap();
            assert_eq!(env.sequence, expected);
        }
    }

    #[tokio::test]
    async fn test_sign_requires_session() {
        let mut s = session(Tier::Community);
        assert!(matches!(
            s.sign("tool", &ToolArgs::new()).await,
            Err(SignerError::SessionNotStarted)
        ));
    }

    #[tokio::test]
    async fn test_community_has_no_chain_links() {
        let mut s = session(Tier::Community);
        s.start_session("q");

        s.sign("a", &ToolArgs::new()).await.unwrap();
        let second = s.sign("b", &ToolArgs::new()).await.unwrap();
        assert!(second.parent_signature.is_none());
    }

    #[tokio::test]
    async fn test_pro_chain_of_custody() {
        let mut s = session(Tier::Pro);
        s.start_session("q");

        let first = s.sign("a", &ToolArgs::new()).await.unwrap();
        assert!(first.parent_signature.is_none());

        let second = s.sign("b", &ToolArgs::new()).await.unwrap();
        assert_eq!(
            second.parent_signature.as_deref(),
            Some(first.signature.to_string().as_str())
        );
        assert!(s.trail().chain_integrity());
    }

    #[tokio::test]
    async fn test_start_session_resets_state() {
        let mut s = session(Tier::Pro);
        s.start_session("first");
        s.sign("a", &ToolArgs::new()).await.unwrap();
        s.sign("b", &ToolArgs::new()).await.unwrap();

        let first_id = s.session_info().unwrap().session_id;
        let second_id = s.start_session("second");
        assert_ne!(first_id, second_id);
        assert!(s.trail().is_empty());

        let env = s.sign("c", &ToolArgs::new()).await.unwrap();
        assert_eq!(env.sequence, 1);
        assert!(env.parent_signature.is_none(), "chain tail was dropped");
    }

    #[tokio::test]
    async fn test_failed_sign_releases_sequence() {
        let mut s = session(Tier::Community);
        s.start_session("q");

        // Nesting beyond the canonicalization depth limit fails the sign.
        let mut deep = json!(1);
        for _ in 0..200 {
            deep = json!([deep]);
        }
        let bad = ToolArgs::new().with("deep", deep);
        assert!(s.sign("tool", &bad).await.is_err());

        let env = s.sign("tool", &ToolArgs::new()).await.unwrap();
        assert_eq!(env.sequence, 1, "the reserved number was released");
    }

    #[tokio::test]
    async fn test_revoked_key_blocks_until_rotation() {
        let mut s = session(Tier::Community);
        s.start_session("q");

        let env = s.sign("a", &ToolArgs::new()).await.unwrap();
        s.revoke_key(env.key_id.clone());
        assert!(matches!(
            s.sign("b", &ToolArgs::new()).await,
            Err(SignerError::RevokedKey { .. })
        ));

        s.rotate_key().unwrap();
        let after = s.sign("b", &ToolArgs::new()).await.unwrap();
        assert_ne!(after.key_id, env.key_id);
        // The rollback from the refused sign means no gap in sequence.
        assert_eq!(after.sequence, 2);
    }

    #[tokio::test]
    async fn test_final_response_attestation() {
        let mut s = session(Tier::Pro);
        s.start_session("summarize");

        let a = s.sign("read_doc", &ToolArgs::new()).await.unwrap();
        let b = s.sign("read_doc", &ToolArgs::new()).await.unwrap();
        let sigs = vec![b.signature.to_string(), a.signature.to_string()];

        let attestation = s
            .sign_final_response("Here is the summary.", &sigs, None)
            .await
            .unwrap();
        assert_eq!(attestation.sequence, 3);
        assert_eq!(
            s.trail().last().unwrap().tool,
            FINAL_RESPONSE_TOOL
        );
        // Signature order does not matter; the sorted set is hashed.
        let mut sorted = sigs.clone();
        sorted.sort();
        let args = ToolArgs::new()
            .with(
                "response_hash",
                ContentHash::hash(b"Here is the summary.").to_hex(),
            )
            .with(
                "tool_signatures_hash",
                ContentHash::hash(sorted.join("\n").as_bytes()).to_hex(),
            );
        assert!(s.verify(&attestation, FINAL_RESPONSE_TOOL, &args));
    }

    #[tokio::test]
    async fn test_final_response_with_extra_context() {
        let mut s = session(Tier::Pro);
        s.start_session("q");
        let env = s.sign("read_doc", &ToolArgs::new()).await.unwrap();

        let extra = json!({"notes": "all tool calls completed"});
        let attestation = s
            .sign_final_response("Done.", &[env.signature.to_string()], Some(extra.clone()))
            .await
            .unwrap();

        assert_eq!(attestation.decision_context, Some(extra));
        assert!(s.trail().last().unwrap().decision_context_hash.is_some());
        assert_eq!(attestation.sequence, 2);
    }

    #[tokio::test]
    async fn test_audit_entries_recorded() {
        let mut s = session(Tier::Pro);
        s.start_session("q");

        let env = s
            .sign_with_context(
                "update_task",
                &ToolArgs::new().with("id", 1),
                Some(json!({"reason": "user asked"})),
            )
            .await
            .unwrap();

        let entry = s.trail().find_by_nonce(&env.nonce).unwrap();
        assert_eq!(entry.tool, "update_task");
        assert_eq!(entry.sequence, 1);
        assert!(entry.decision_context_hash.is_some());
        assert_eq!(entry.signature, env.signature.to_string());
    }

    #[tokio::test]
    async fn test_compliance_report_enterprise_only() {
        let mut pro = session(Tier::Pro);
        pro.start_session("q");
        pro.sign("a", &ToolArgs::new()).await.unwrap();
        assert!(pro.compliance_report().is_none());

        let mut ent = session(Tier::Enterprise);
        ent.start_session("q");
        ent.sign("a", &ToolArgs::new()).await.unwrap();
        let report = ent.compliance_report().unwrap();
        assert_eq!(report.total_operations, 1);
    }

    #[tokio::test]
    async fn test_execution_context_binds_envelope() {
        let ctx = ExecutionContext {
            instance_id: Some("i-1".to_string()),
            ..Default::default()
        };
        let mut s = Session::new(TrustChainConfig::new(), AgentId::new("a"))
            .with_execution_context(ctx.clone());
        s.start_session("q");

        let args = ToolArgs::new();
        let envelope = s.sign("tool", &args).await.unwrap();
        assert_eq!(envelope.execution_context.as_ref(), Some(&ctx));
        assert!(s.verify(&envelope, "tool", &args));

        // Stripping the context changes the signed bytes.
        let mut stripped = envelope.clone();
        stripped.execution_context = None;
        assert!(!s.verify(&stripped, "tool", &args));
    }

    #[tokio::test]
    async fn test_end_session_keeps_trail() {
        let mut s = session(Tier::Pro);
        s.start_session("q");
        s.sign("a", &ToolArgs::new()).await.unwrap();

        let info = s.end_session().unwrap();
        assert_eq!(info.operations, 1);
        assert!(info.chain_integrity);
        assert_eq!(s.trail().len(), 1, "evidence survives the session");
        assert!(s.session_info().is_none());
    }

    #[test]
    fn test_hmac_envelope_verifies_with_shared_key() {
        let key = HmacKey::generate();
        let args = ToolArgs::new().with("q", "x");
        let ts = Timestamp::now();
        let payload = signing_payload(
            "search",
            &args,
            None,
            &key.key_id(),
            1,
            SIGNATURE_SCHEMA_VERSION,
            None,
            &ts,
        );
        let tag = key.sign(&canonical_bytes(&payload).unwrap());

        let envelope = Envelope {
            signature: WireSignature::new(Algorithm::HmacSha256, tag),
            nonce: AuditEntry::new_nonce(),
            agent_id: AgentId::new("a"),
            session_id: SessionId::new(),
            timestamp: ts,
            user_query: "q".to_string(),
            sequence: 1,
            signature_schema_version: SIGNATURE_SCHEMA_VERSION.to_string(),
            key_id: key.key_id(),
            tenant_id: None,
            algorithm: Algorithm::HmacSha256,
            public_key: None,
            parent_signature: None,
            certificate: Certificate::self_issued("a", Tier::Community),
            decision_context: None,
            execution_context: None,
        };

        assert!(verify_envelope(&envelope, "search", &args, Some(&key)));
        assert!(
            !verify_envelope(&envelope, "search", &args, None),
            "symmetric envelopes need the shared key"
        );
        assert!(!verify_envelope(
            &envelope,
            "search",
            &args,
            Some(&HmacKey::generate())
        ));
    }
}
