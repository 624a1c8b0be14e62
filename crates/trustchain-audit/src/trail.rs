//! The append-only audit trail.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use trustchain_core::{Certificate, Tier, Timestamp};

use crate::entry::AuditEntry;
use crate::error::{AuditError, AuditResult};

/// Append-only, in-memory ledger of signed operations.
///
/// Cleared when a new session starts. Visibility of historical entries is
/// gated by [`Tier`]; integrity checking always walks the full trail.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// Create an empty trail.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entry.
    pub fn append(&mut self, entry: AuditEntry) {
        debug!(
            tool = %entry.tool,
            sequence = entry.sequence,
            "audit entry appended"
        );
        self.entries.push(entry);
    }

    /// Drop all entries (called on session start).
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Total number of recorded operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the trail is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The most recent entry, if any.
    #[must_use]
    pub fn last(&self) -> Option<&AuditEntry> {
        self.entries.last()
    }

    /// Entries visible at the given tier.
    ///
    /// Community sees only the trailing window; paid tiers see everything.
    #[must_use]
    pub fn visible_entries(&self, tier: Tier) -> &[AuditEntry] {
        match tier.audit_window() {
            Some(window) if self.entries.len() > window => {
                &self.entries[self.entries.len() - window..]
            },
            _ => &self.entries,
        }
    }

    /// Walk the trail and confirm every present `parent_signature` matches
    /// the signature of the entry before it.
    #[must_use]
    pub fn chain_integrity(&self) -> bool {
        self.entries.windows(2).all(|pair| {
            match &pair[1].parent_signature {
                Some(parent) => *parent == pair[0].signature,
                None => true,
            }
        })
    }

    /// Find an entry by its signature string.
    #[must_use]
    pub fn find_by_signature(&self, signature: &str) -> Option<&AuditEntry> {
        self.entries.iter().find(|e| e.signature == signature)
    }

    /// Find an entry by its operation nonce.
    #[must_use]
    pub fn find_by_nonce(&self, nonce: &str) -> Option<&AuditEntry> {
        self.entries.iter().find(|e| e.nonce == nonce)
    }

    /// Aggregate statistics over the whole trail.
    #[must_use]
    pub fn stats(&self) -> TrailStats {
        let mut tools: BTreeMap<String, ToolStats> = BTreeMap::new();
        for entry in &self.entries {
            let stat = tools.entry(entry.tool.clone()).or_default();
            stat.calls += 1;
            stat.last_call = Some(entry.timestamp);
        }
        TrailStats {
            total_operations: self.entries.len(),
            chain_length: self.entries.len(),
            chain_integrity: self.chain_integrity(),
            tools,
        }
    }

    /// Export the full chain as a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::SerializationError`] if serialization fails.
    pub fn export_json(&self) -> AuditResult<String> {
        serde_json::to_string(&self.entries)
            .map_err(|e| AuditError::SerializationError(e.to_string()))
    }

    /// Export a compliance report.
    ///
    /// Gated to the enterprise tier: returns `None` (not partial data) for
    /// anything below it.
    #[must_use]
    pub fn export_compliance_report(&self, certificate: &Certificate) -> Option<ComplianceReport> {
        if !certificate.tier.compliance_reports() {
            return None;
        }
        Some(ComplianceReport {
            total_operations: self.entries.len(),
            chain_integrity: self.chain_integrity(),
            compliance_markers: certificate.features.compliance_markers.clone(),
            generated_at: Timestamp::now(),
        })
    }
}

/// Aggregate trail statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailStats {
    /// Total signed operations.
    pub total_operations: usize,
    /// Length of the signature chain.
    pub chain_length: usize,
    /// Whether every parent link checks out.
    pub chain_integrity: bool,
    /// Per-tool call statistics, keyed by tool name.
    pub tools: BTreeMap<String, ToolStats>,
}

/// Per-tool call statistics.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolStats {
    /// Number of signed calls to this tool.
    pub calls: usize,
    /// Timestamp of the most recent call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_call: Option<Timestamp>,
}

/// Enterprise compliance summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Total signed operations in the session.
    pub total_operations: usize,
    /// Whether the signature chain is intact.
    pub chain_integrity: bool,
    /// Compliance frameworks attested by the certificate.
    pub compliance_markers: Vec<String>,
    /// When the report was generated.
    pub generated_at: Timestamp,
}
