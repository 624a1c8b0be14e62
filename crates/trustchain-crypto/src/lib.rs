//! TrustChain Crypto - Canonicalization and signing primitives.
//!
//! This crate provides:
//! - Deterministic JSON canonicalization (key-order independent)
//! - Ed25519 key pairs with secure memory handling
//! - HMAC-SHA256 symmetric fallback for relaxed deployments
//! - SHA-256 content hashing for argument and context digests
//!
//! # Example
//!
//! ```
//! use trustchain_crypto::{canonical_bytes, KeyPair};
//! use serde_json::json;
//!
//! let keypair = KeyPair::generate();
//!
//! // Key order does not matter once canonicalized.
//! let a = canonical_bytes(&json!({"b": 2, "a": 1})).unwrap();
//! let b = canonical_bytes(&json!({"a": 1, "b": 2})).unwrap();
//! assert_eq!(a, b);
//!
//! let signature = keypair.sign(&a);
//! assert!(keypair.verify(&b, &signature).is_ok());
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod algorithm;
mod canonical;
mod error;
mod hash;
mod hmac_key;
mod keypair;
mod signature;

pub use algorithm::{Algorithm, CapabilityProbe};
pub use canonical::{canonical_bytes, MAX_CANONICAL_DEPTH};
pub use error::{CryptoError, CryptoResult};
pub use hash::ContentHash;
pub use hmac_key::HmacKey;
pub use keypair::{derive_key_id, KeyPair, PublicKey};
pub use signature::Signature;
