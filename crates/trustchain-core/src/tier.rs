//! Tier feature gates and embedded certificates.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::Timestamp;

/// Licensing tier, gating audit visibility, chain-of-custody linking, and
/// compliance reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Free tier: truncated audit view, no chaining, no compliance export.
    #[default]
    Community,
    /// Paid tier: full audit view and chain-of-custody linking.
    Pro,
    /// Paid tier: everything in pro plus compliance report export.
    Enterprise,
}

impl Tier {
    /// How many trailing audit entries this tier may see.
    ///
    /// `None` means unrestricted.
    #[must_use]
    pub fn audit_window(&self) -> Option<usize> {
        match self {
            Self::Community => Some(10),
            Self::Pro | Self::Enterprise => None,
        }
    }

    /// Whether envelopes carry `parent_signature` chain-of-custody links.
    #[must_use]
    pub fn chain_of_custody(&self) -> bool {
        !matches!(self, Self::Community)
    }

    /// Whether compliance reports may be exported.
    #[must_use]
    pub fn compliance_reports(&self) -> bool {
        matches!(self, Self::Enterprise)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Community => write!(f, "community"),
            Self::Pro => write!(f, "pro"),
            Self::Enterprise => write!(f, "enterprise"),
        }
    }
}

/// Issuer metadata embedded in every envelope.
///
/// Immutable once attached; verification treats it as opaque identity
/// context, not as a trust anchor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Key owner (person or service account).
    pub owner: String,
    /// Issuing organization.
    pub organization: String,
    /// Role of the owner within the organization.
    pub role: String,
    /// Tier the certificate was issued for.
    pub tier: Tier,
    /// When the certificate was issued.
    pub issued_at: Timestamp,
    /// Tier-gated feature markers.
    pub features: CertificateFeatures,
}

impl Certificate {
    /// A self-issued certificate for local development.
    #[must_use]
    pub fn self_issued(owner: impl Into<String>, tier: Tier) -> Self {
        Self {
            owner: owner.into(),
            organization: "self-issued".to_string(),
            role: "agent".to_string(),
            tier,
            issued_at: Timestamp::now(),
            features: CertificateFeatures {
                policy_engine: tier >= Tier::Pro,
                compliance_markers: if tier.compliance_reports() {
                    vec!["SOC2".to_string(), "AI_ACT".to_string()]
                } else {
                    Vec::new()
                },
            },
        }
    }
}

/// Feature flags carried inside a [`Certificate`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateFeatures {
    /// Whether the policy engine is licensed.
    pub policy_engine: bool,
    /// Compliance frameworks the certificate attests to.
    #[serde(default)]
    pub compliance_markers: Vec<String>,
}
