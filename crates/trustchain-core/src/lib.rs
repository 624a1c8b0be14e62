//! TrustChain Core - Shared types for the tool-call signing runtime.
//!
//! This crate provides:
//! - Identifier newtypes (`SessionId`, `AgentId`, `TenantId`)
//! - RFC 3339 timestamps
//! - The `Tier` feature gate (community / pro / enterprise)
//! - `ToolArgs`, the key-ordered tool argument map
//! - The explicit [`TrustChainConfig`] configuration struct
//!
//! # Security Philosophy
//!
//! **Cryptography over prompts.** Every tool invocation is bound to an
//! Ed25519 signature and a per-session sequence number, not to hoping the
//! LLM behaves. This crate holds the vocabulary the signing, audit, and
//! policy crates share.

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod args;
mod config;
mod ids;
mod tier;

pub use args::{ExecutionContext, ToolArgs};
pub use config::{RegistrySyncConfig, SignerConfig, TrustChainConfig};
pub use ids::{AgentId, SessionId, TenantId, Timestamp};
pub use tier::{Certificate, CertificateFeatures, Tier};

/// Version of the envelope signing schema.
///
/// Bumped whenever the canonical payload layout changes; verification
/// refuses envelopes from a different major schema.
pub const SIGNATURE_SCHEMA_VERSION: &str = "2.0";
