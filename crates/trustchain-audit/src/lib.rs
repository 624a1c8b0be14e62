//! TrustChain Audit - Append-only ledger of signed tool operations.
//!
//! Every `sign()` call appends one [`AuditEntry`]. Entries record digests
//! of the tool arguments, never the raw values. Consecutive entries may be
//! chain-linked via `parent_signature`, forming a verifiable sequence; any
//! modification of history breaks the chain and is detectable.
//!
//! Visibility is tier-gated: community sessions see a truncated window,
//! paid tiers see the full trail, and compliance export is enterprise-only.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod entry;
mod error;
mod trail;

pub use entry::AuditEntry;
pub use error::{AuditError, AuditResult};
pub use trail::{AuditTrail, ComplianceReport, ToolStats, TrailStats};
