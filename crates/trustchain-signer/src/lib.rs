//! TrustChain Signer - Envelope construction, verification, and key lifecycle.
//!
//! This crate provides:
//! - [`Session`], the caller-owned signing engine (sequence numbers,
//!   chain-of-custody linking, audit recording)
//! - [`KeyManager`], the key lifecycle (initialize / rotate / revoke,
//!   strict-mode enforcement, external delegation)
//! - [`ExternalSignerBridge`], an HTTP delegate for KMS/HSM signing
//! - [`verify_envelope`], boolean verification of a claimed
//!   (tool, args, envelope) triple
//!
//! # Example
//!
//! ```no_run
//! use trustchain_core::{ToolArgs, TrustChainConfig};
//! use trustchain_signer::Session;
//!
//! # async fn demo() -> Result<(), trustchain_signer::SignerError> {
//! let mut session = Session::new(TrustChainConfig::new(), "agent-1".into());
//! session.start_session("summarize my open tasks");
//!
//! let args = ToolArgs::new().with("limit", 10);
//! let envelope = session.sign("list_tasks", &args).await?;
//! assert!(session.verify(&envelope, "list_tasks", &args));
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod bridge;
mod engine;
mod envelope;
mod error;
mod keymanager;
mod verify;

pub use bridge::{ExternalSignerBridge, SignerHealth, SignerHealthState};
pub use engine::{Session, SessionInfo, FINAL_RESPONSE_TOOL};
pub use envelope::{signing_payload, Envelope, WireSignature};
pub use error::{SignerError, SignerResult};
pub use keymanager::{KeyInfo, KeyManager};
pub use verify::verify_envelope;
