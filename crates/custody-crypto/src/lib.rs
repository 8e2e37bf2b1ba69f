//! Cryptographic primitives for the custody ledger.
//!
//! Provides the SHA-256 event fingerprint, domain-separated BLAKE3 hashing
//! for content addresses and ledger references, and Ed25519 signing of
//! ledger transactions.
//!
//! All crypto operations wrap established libraries; there is no custom cryptography.

pub mod fingerprint;
pub mod hasher;
pub mod signer;

pub use fingerprint::{compute_fingerprint, format_event_time, verify_fingerprint};
pub use hasher::ContentHasher;
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
