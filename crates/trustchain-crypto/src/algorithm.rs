//! Signing algorithm identifiers and the startup capability probe.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Signing algorithm carried in envelopes and signature prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Algorithm {
    /// Ed25519 asymmetric signatures (preferred).
    Ed25519,
    /// HMAC-SHA256 symmetric signatures (relaxed deployments only).
    HmacSha256,
}

impl Algorithm {
    /// Wire name, used as the signature prefix (`<algorithm>:<base64>`).
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::HmacSha256 => "hmac-sha256",
        }
    }

    /// Parse a wire name.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ed25519" => Some(Self::Ed25519),
            "hmac-sha256" => Some(Self::HmacSha256),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of probing Ed25519 availability, resolved once at startup.
///
/// Modeled as an explicit variant rather than a per-call catch: the probe
/// runs when a key manager initializes and its outcome is fixed for the
/// process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityProbe {
    /// Ed25519 signing is available.
    Ed25519Available,
    /// Ed25519 signing is unavailable; only the HMAC fallback can be used.
    Ed25519Unavailable,
}

impl CapabilityProbe {
    /// Probe the platform.
    ///
    /// `ed25519-dalek` is a pure-Rust implementation, so the probe succeeds
    /// everywhere this crate compiles; the variant exists so relaxed
    /// deployments (and tests) can model the unavailable case explicitly.
    #[must_use]
    pub fn run() -> Self {
        Self::Ed25519Available
    }

    /// The algorithm this probe resolves to.
    #[must_use]
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Ed25519Available => Algorithm::Ed25519,
            Self::Ed25519Unavailable => Algorithm::HmacSha256,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(Algorithm::Ed25519.as_str(), "ed25519");
        assert_eq!(Algorithm::HmacSha256.as_str(), "hmac-sha256");
        assert_eq!(Algorithm::parse("ed25519"), Some(Algorithm::Ed25519));
        assert_eq!(Algorithm::parse("hmac-sha256"), Some(Algorithm::HmacSha256));
        assert_eq!(Algorithm::parse("rsa"), None);
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&Algorithm::HmacSha256).unwrap();
        assert_eq!(json, "\"hmac-sha256\"");
    }

    #[test]
    fn test_probe_resolves_ed25519() {
        assert_eq!(CapabilityProbe::run().algorithm(), Algorithm::Ed25519);
        assert_eq!(
            CapabilityProbe::Ed25519Unavailable.algorithm(),
            Algorithm::HmacSha256
        );
    }
}
