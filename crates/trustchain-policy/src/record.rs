//! Trust records for remote tool servers.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use trustchain_core::Timestamp;

/// Issuer string for records created by local-dev auto-bootstrap, so they
/// are always distinguishable from registry-sourced trust.
pub const LOCAL_BOOTSTRAP_ISSUER: &str = "local-dev-bootstrap";

/// How much a remote server is trusted to do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// Read-only experimentation; mutating tools are denied.
    #[default]
    Sandbox,
    /// Fully trusted for mutating and read-only tools.
    Trusted,
    /// Trusted with an externally verified identity.
    Verified,
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sandbox => write!(f, "sandbox"),
            Self::Trusted => write!(f, "trusted"),
            Self::Verified => write!(f, "verified"),
        }
    }
}

/// Lifecycle state of a trust record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    /// The record is live.
    #[default]
    Active,
    /// Trust was withdrawn; the record stays queryable.
    Revoked,
    /// The validity window has passed.
    Expired,
    /// Temporarily disabled by the authority.
    Suspended,
}

/// One remote tool server's standing in the trust registry.
///
/// Created by registry sync or local bootstrap, mutated by revocation,
/// never deleted: a revoked server must stay queryable as revoked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustRecord {
    /// Stable server identifier.
    pub server_id: String,
    /// Who vouched for this server.
    pub issuer: String,
    /// Certificate or key fingerprint, as reported by the issuer.
    pub fingerprint: String,
    /// Start of the validity window.
    pub valid_from: Timestamp,
    /// End of the validity window.
    pub valid_to: Timestamp,
    /// Whether trust has been withdrawn.
    #[serde(default)]
    pub revoked: bool,
    /// Lifecycle state.
    #[serde(default)]
    pub status: TrustStatus,
    /// Trust tier.
    #[serde(default)]
    pub tier: TrustTier,
}

impl TrustRecord {
    /// Create an active record for a validity window.
    #[must_use]
    pub fn new(
        server_id: impl Into<String>,
        issuer: impl Into<String>,
        fingerprint: impl Into<String>,
        valid_from: Timestamp,
        valid_to: Timestamp,
        tier: TrustTier,
    ) -> Self {
        Self {
            server_id: server_id.into(),
            issuer: issuer.into(),
            fingerprint: fingerprint.into(),
            valid_from,
            valid_to,
            revoked: false,
            status: TrustStatus::Active,
            tier,
        }
    }

    /// A local-dev bootstrap record: trusted for a bounded window, with a
    /// fixed issuer that marks it as not registry-sourced.
    #[must_use]
    pub fn local_bootstrap(server_id: impl Into<String>, window: Duration) -> Self {
        let now = Timestamp::now();
        Self::new(
            server_id,
            LOCAL_BOOTSTRAP_ISSUER,
            "local",
            now,
            Timestamp(now.0 + window),
            TrustTier::Trusted,
        )
    }

    /// Whether the validity window has passed (or not yet begun) at `now`.
    #[must_use]
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now < self.valid_from || now > self.valid_to
    }

    /// Withdraw trust. Irreversible short of a fresh sync.
    pub fn revoke(&mut self) {
        self.revoked = true;
        self.status = TrustStatus::Revoked;
    }

    /// Whether the record came from local bootstrap rather than a registry.
    #[must_use]
    pub fn is_bootstrap(&self) -> bool {
        self.issuer == LOCAL_BOOTSTRAP_ISSUER
    }
}
