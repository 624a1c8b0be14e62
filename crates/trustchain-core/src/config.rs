//! Runtime configuration.
//!
//! All feature flags are explicit fields on [`TrustChainConfig`], passed at
//! construction. Nothing in the runtime sniffs environment variables.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::tier::Tier;

/// Configuration for a signing session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustChainConfig {
    /// Refuse to sign with anything weaker than Ed25519.
    ///
    /// When false (relaxed deployments only) the runtime may fall back to
    /// HMAC-SHA256 if Ed25519 is unavailable.
    #[serde(default = "default_true")]
    pub strict_mode: bool,
    /// Allow calls to loopback tool servers that have no trust record.
    #[serde(default)]
    pub allow_unsigned_local: bool,
    /// Allow the unsigned-read fallback for signature-validation outages
    /// on loopback servers. Never applies to mutating tools.
    #[serde(default)]
    pub unsigned_read_fallback: bool,
    /// Delegate signing to an external KMS/HSM signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_signer: Option<SignerConfig>,
    /// Remote trust-registry sync source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_sync: Option<RegistrySyncConfig>,
    /// Licensing tier.
    #[serde(default)]
    pub tier: Tier,
}

fn default_true() -> bool {
    true
}

impl Default for TrustChainConfig {
    fn default() -> Self {
        Self {
            strict_mode: true,
            allow_unsigned_local: false,
            unsigned_read_fallback: false,
            external_signer: None,
            registry_sync: None,
            tier: Tier::Community,
        }
    }
}

impl TrustChainConfig {
    /// Default configuration: strict mode on, every escape hatch off.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the licensing tier.
    #[must_use]
    pub fn with_tier(mut self, tier: Tier) -> Self {
        self.tier = tier;
        self
    }

    /// Disable strict mode (relaxed deployments only).
    #[must_use]
    pub fn relaxed(mut self) -> Self {
        self.strict_mode = false;
        self
    }

    /// Allow unsigned calls to loopback servers with no trust record.
    #[must_use]
    pub fn allow_unsigned_local(mut self) -> Self {
        self.allow_unsigned_local = true;
        self
    }

    /// Enable the unsigned-read fallback escape hatch.
    #[must_use]
    pub fn with_unsigned_read_fallback(mut self) -> Self {
        self.unsigned_read_fallback = true;
        self
    }

    /// Delegate signing to an external signer.
    #[must_use]
    pub fn with_external_signer(mut self, signer: SignerConfig) -> Self {
        self.external_signer = Some(signer);
        self
    }

    /// Configure remote trust-registry sync.
    #[must_use]
    pub fn with_registry_sync(mut self, sync: RegistrySyncConfig) -> Self {
        self.registry_sync = Some(sync);
        self
    }
}

/// External signer (KMS/HSM) connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Base URL of the signer service.
    pub base_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_signer_timeout_ms")]
    pub timeout_ms: u64,
    /// Key id, if known ahead of the health probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Base64 public key, if known ahead of the health probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
}

fn default_signer_timeout_ms() -> u64 {
    5_000
}

impl SignerConfig {
    /// Create a signer config for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_signer_timeout_ms(),
            key_id: None,
            public_key: None,
        }
    }

    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis().try_into().unwrap_or(u64::MAX);
        self
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Remote trust-registry sync settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySyncConfig {
    /// Base URL of the trust authority.
    pub base_url: String,
    /// Request timeout in milliseconds.
    #[serde(default = "default_sync_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_sync_timeout_ms() -> u64 {
    10_000
}

impl RegistrySyncConfig {
    /// Create a sync config for the given base URL.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_ms: default_sync_timeout_ms(),
        }
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
