//! Allow/deny decisions for remote tool calls.

use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};
use trustchain_core::{Timestamp, TrustChainConfig};
use url::Url;

use crate::record::{TrustStatus, TrustTier};
use crate::registry::TrustRegistry;

/// Marker inserted into results that proceeded via the unsigned-read
/// fallback, so downstream consumers can audit that the signature
/// guarantee did not hold for that call.
pub const FALLBACK_MARKER: &str = "trustchain_fallback_unsigned";

/// Tool-name heuristic for calls that change state.
///
/// A judgment call over names, not a verified security boundary; servers
/// that name their mutating tools creatively will slip past it.
const MUTATING_PATTERN: &str =
    r"^(create_|update_|delete_|upsert_|write_|apply_|set_|run_|execute_)|approve|block|revoke";

/// A remote tool server as a policy target.
#[derive(Debug, Clone)]
pub struct ServerTarget {
    /// Stable server identifier (the trust registry key).
    pub server_id: String,
    /// Endpoint URL.
    pub url: String,
}

impl ServerTarget {
    /// Build a target from id and endpoint.
    #[must_use]
    pub fn new(server_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            server_id: server_id.into(),
            url: url.into(),
        }
    }

    /// Whether the endpoint resolves to a loopback/local address.
    #[must_use]
    pub fn is_loopback(&self) -> bool {
        let Ok(parsed) = Url::parse(&self.url) else {
            return false;
        };
        match parsed.host() {
            Some(url::Host::Domain(domain)) => domain == "localhost",
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        }
    }
}

/// Outcome of a policy check. Denials always carry a reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// The call may proceed.
    Allow,
    /// The call must not proceed.
    Deny {
        /// Human-readable explanation, surfaced to the caller.
        reason: String,
    },
}

impl PolicyDecision {
    fn deny(reason: impl Into<String>) -> Self {
        Self::Deny {
            reason: reason.into(),
        }
    }

    /// Whether the call is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// The deny reason, if this is a denial.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason } => Some(reason),
        }
    }
}

/// Decides whether tool calls may reach a remote server.
#[derive(Debug)]
pub struct PolicyEvaluator {
    config: TrustChainConfig,
    mutating: Regex,
}

impl PolicyEvaluator {
    /// Build an evaluator for a configuration.
    #[must_use]
    pub fn new(config: TrustChainConfig) -> Self {
        let mutating = Regex::new(MUTATING_PATTERN)
            .unwrap_or_else(|_| unreachable!("the mutating-tool pattern is a valid regex"));
        Self { config, mutating }
    }

    /// Whether a tool name is classified as mutating.
    #[must_use]
    pub fn is_mutating(&self, tool: &str) -> bool {
        self.mutating.is_match(tool)
    }

    /// Decide whether `tool` may be called on `server`.
    ///
    /// Checks run in a fixed order: revoked, expired, inactive, then the
    /// mutating-tool tier gate. A server with no record is allowed only
    /// when it is loopback and `allow_unsigned_local` is set.
    #[must_use]
    pub fn evaluate_trust(
        &self,
        registry: &TrustRegistry,
        server: &ServerTarget,
        tool: Option<&str>,
    ) -> PolicyDecision {
        let decision = self.evaluate_inner(registry, server, tool);
        if let PolicyDecision::Deny { reason } = &decision {
            warn!(server_id = %server.server_id, tool = ?tool, reason = %reason, "tool call denied");
        } else {
            debug!(server_id = %server.server_id, tool = ?tool, "tool call allowed");
        }
        decision
    }

    fn evaluate_inner(
        &self,
        registry: &TrustRegistry,
        server: &ServerTarget,
        tool: Option<&str>,
    ) -> PolicyDecision {
        let Some(record) = registry.get(&server.server_id) else {
            if server.is_loopback() && self.config.allow_unsigned_local {
                return PolicyDecision::Allow;
            }
            return PolicyDecision::deny(format!(
                "server {} has no trust record and is not an allowed local target",
                server.server_id
            ));
        };

        if record.revoked {
            return PolicyDecision::deny(format!(
                "trust for server {} was revoked by {}",
                server.server_id, record.issuer
            ));
        }
        if record.is_expired(Timestamp::now()) {
            return PolicyDecision::deny(format!(
                "trust record for server {} is outside its validity window",
                server.server_id
            ));
        }
        if record.status != TrustStatus::Active {
            return PolicyDecision::deny(format!(
                "trust record for server {} is not active",
                server.server_id
            ));
        }
        if let Some(tool) = tool {
            if self.is_mutating(tool) && record.tier < TrustTier::Trusted {
                return PolicyDecision::deny(format!(
                    "mutating tool {} requires at least the trusted tier, server {} is {}",
                    tool, server.server_id, record.tier
                ));
            }
        }
        PolicyDecision::Allow
    }

    /// Decide whether a denied call may retry unsigned.
    ///
    /// This narrow escape hatch exists so a signature-validation outage on
    /// a local dev server degrades to unsigned reads instead of blocking
    /// the session. It never applies to mutating tools, non-loopback
    /// targets, or deny reasons outside the signature class, and it is off
    /// unless `unsigned_read_fallback` was explicitly enabled.
    #[must_use]
    pub fn should_allow_unsigned_read_fallback(
        &self,
        server: &ServerTarget,
        tool: &str,
        deny_code: Option<&str>,
        deny_message: Option<&str>,
    ) -> bool {
        self.config.unsigned_read_fallback
            && !self.is_mutating(tool)
            && server.is_loopback()
            && is_signature_denial(deny_code, deny_message)
    }

    /// Stamp a fallback result with the [`FALLBACK_MARKER`].
    pub fn mark_unsigned_fallback(result: &mut Value) {
        if let Value::Object(map) = result {
            map.insert(FALLBACK_MARKER.to_string(), Value::Bool(true));
        }
    }
}

/// Whether a deny reason is in the "signature invalid/missing" class.
fn is_signature_denial(code: Option<&str>, message: Option<&str>) -> bool {
    if let Some(code) = code {
        let code = code.to_ascii_uppercase();
        if code.contains("SIGNATURE") || code == "UNSIGNED_REQUEST" {
            return true;
        }
    }
    message.is_some_and(|m| m.to_ascii_lowercase().contains("signature"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::TrustRecord;
    use chrono::Duration;
    use serde_json::json;

    fn registry_with(record: TrustRecord) -> TrustRegistry {
        let mut registry = TrustRegistry::new();
        registry.upsert(record).unwrap();
        registry
    }

    fn record(server_id: &str, tier: TrustTier) -> TrustRecord {
        let now = Timestamp::now();
        TrustRecord::new(
            server_id,
            "authority",
            "fp",
            Timestamp(now.0 - Duration::hours(1)),
            Timestamp(now.0 + Duration::hours(1)),
            tier,
        )
    }

    fn remote() -> ServerTarget {
        ServerTarget::new("s1", "https://tools.example.com")
    }

    #[test]
    fn test_mutating_heuristic() {
        let eval = PolicyEvaluator::new(TrustChainConfig::new());
        for tool in [
            "create_task",
            "update_row",
            "delete_file",
            "upsert_record",
            "write_file",
            "apply_patch",
            "set_config",
            "run_script",
            "execute_query",
            "user_approve",
            "block_sender",
            "revoke_access",
        ] {
            assert!(eval.is_mutating(tool), "{tool} should be mutating");
        }
        for tool in ["list_tasks", "read_file", "search", "get_status", "creates"] {
            assert!(!eval.is_mutating(tool), "{tool} should be read-only");
        }
    }

    #[test]
    fn test_revoked_denied_regardless_of_tier() {
        let mut rec = record("s1", TrustTier::Verified);
        rec.revoke();
        let registry = registry_with(rec);
        let eval = PolicyEvaluator::new(TrustChainConfig::new());

        let decision = eval.evaluate_trust(&registry, &remote(), Some("list_tasks"));
        assert!(!decision.is_allowed());
        assert!(decision.reason().unwrap().contains("revoked"));
    }

    #[test]
    fn test_expired_denied() {
        let now = Timestamp::now();
        let rec = TrustRecord::new(
            "s1",
            "authority",
            "fp",
            Timestamp(now.0 - Duration::hours(2)),
            Timestamp(now.0 - Duration::hours(1)),
            TrustTier::Verified,
        );
        let registry = registry_with(rec);
        let eval = PolicyEvaluator::new(TrustChainConfig::new());
        assert!(!eval.evaluate_trust(&registry, &remote(), None).is_allowed());
    }

    #[test]
    fn test_inactive_denied() {
        let mut rec = record("s1", TrustTier::Trusted);
        rec.status = TrustStatus::Suspended;
        let registry = registry_with(rec);
        let eval = PolicyEvaluator::new(TrustChainConfig::new());
        assert!(!eval.evaluate_trust(&registry, &remote(), None).is_allowed());
    }

    #[test]
    fn test_mutating_tier_gate() {
        let eval = PolicyEvaluator::new(TrustChainConfig::new());

        let sandbox = registry_with(record("s1", TrustTier::Sandbox));
        assert!(!eval
            .evaluate_trust(&sandbox, &remote(), Some("delete_file"))
            .is_allowed());
        assert!(eval
            .evaluate_trust(&sandbox, &remote(), Some("list_tasks"))
            .is_allowed());

        let trusted = registry_with(record("s1", TrustTier::Trusted));
        assert!(eval
            .evaluate_trust(&trusted, &remote(), Some("delete_file"))
            .is_allowed());
    }

    #[test]
    fn test_no_record_loopback_gate() {
        let registry = TrustRegistry::new();
        let local = ServerTarget::new("local", "http://127.0.0.1:8080");
        let remote = ServerTarget::new("remote", "https://tools.example.com");

        let default = PolicyEvaluator::new(TrustChainConfig::new());
        assert!(!default.evaluate_trust(&registry, &local, None).is_allowed());

        let permissive =
            PolicyEvaluator::new(TrustChainConfig::new().allow_unsigned_local());
        assert!(permissive.evaluate_trust(&registry, &local, None).is_allowed());
        assert!(!permissive.evaluate_trust(&registry, &remote, None).is_allowed());
    }

    #[test]
    fn test_loopback_detection() {
        assert!(ServerTarget::new("a", "http://localhost:3000").is_loopback());
        assert!(ServerTarget::new("a", "http://127.0.0.1:3000").is_loopback());
        assert!(ServerTarget::new("a", "http://[::1]:3000").is_loopback());
        assert!(!ServerTarget::new("a", "https://tools.example.com").is_loopback());
        assert!(!ServerTarget::new("a", "not a url").is_loopback());
    }

    #[test]
    fn test_unsigned_read_fallback_truth_table() {
        let local = ServerTarget::new("local", "http://localhost:3000");
        let remote = remote();
        let enabled =
            PolicyEvaluator::new(TrustChainConfig::new().with_unsigned_read_fallback());
        let disabled = PolicyEvaluator::new(TrustChainConfig::new());

        let sig_code = Some("SIGNATURE_INVALID");

        // The one combination that passes.
        assert!(enabled.should_allow_unsigned_read_fallback(&local, "list_tasks", sig_code, None));

        // Each condition broken in turn.
        assert!(!disabled.should_allow_unsigned_read_fallback(&local, "list_tasks", sig_code, None));
        assert!(!enabled.should_allow_unsigned_read_fallback(&local, "delete_file", sig_code, None));
        assert!(!enabled.should_allow_unsigned_read_fallback(&remote, "list_tasks", sig_code, None));
        assert!(!enabled.should_allow_unsigned_read_fallback(
            &local,
            "list_tasks",
            Some("RATE_LIMITED"),
            None
        ));

        // Message-based classification.
        assert!(enabled.should_allow_unsigned_read_fallback(
            &local,
            "list_tasks",
            None,
            Some("request signature missing")
        ));
    }

    #[test]
    fn test_fallback_marker() {
        let mut result = json!({"data": [1, 2]});
        PolicyEvaluator::mark_unsigned_fallback(&mut result);
        assert_eq!(result[FALLBACK_MARKER], json!(true));
    }
}
