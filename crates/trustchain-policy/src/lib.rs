//! TrustChain Policy - Trust registry and call gating for remote tool
//! servers.
//!
//! This crate provides:
//! - [`TrustRecord`] / [`TrustRegistry`]: per-server trust state with JSON
//!   persistence, remote sync, revocation, and local-dev bootstrap
//! - [`PolicyEvaluator`]: ordered allow/deny checks, the mutating-tool
//!   heuristic, and the unsigned-read fallback gate
//! - [`extract_policy_denial`]: locating deny signals in nested
//!   tool-server response shapes
//!
//! # Example
//!
//! ```
//! use trustchain_core::TrustChainConfig;
//! use trustchain_policy::{PolicyEvaluator, ServerTarget, TrustRegistry};
//!
//! let registry = TrustRegistry::new();
//! let evaluator = PolicyEvaluator::new(TrustChainConfig::new());
//!
//! // No record, not loopback: denied with a reason.
//! let target = ServerTarget::new("crm", "https://crm.example.com");
//! let decision = evaluator.evaluate_trust(&registry, &target, Some("delete_contact"));
//! assert!(!decision.is_allowed());
//! assert!(decision.reason().is_some());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod deny;
mod error;
mod evaluator;
mod record;
mod registry;

pub use deny::{extract_policy_denial, PolicyDenial};
pub use error::{PolicyError, PolicyResult};
pub use evaluator::{PolicyDecision, PolicyEvaluator, ServerTarget, FALLBACK_MARKER};
pub use record::{TrustRecord, TrustStatus, TrustTier, LOCAL_BOOTSTRAP_ISSUER};
pub use registry::TrustRegistry;
