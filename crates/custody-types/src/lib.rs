//! Foundation types for the custody ledger.
//!
//! Every chain-of-custody event is split across three substrates: the raw
//! payload lives in a content store, a fingerprint is anchored on a public
//! ledger, and an [`EventRecord`] tying the two together is indexed in a
//! metadata store. This crate defines the types shared by all of them.
//!
//! # Key Types
//!
//! - [`EventId`] - UUID v7 record identifier
//! - [`EventType`] - Fixed enumeration of custody events
//! - [`AnchorState`] - `pending -> confirmed | failed` lifecycle
//! - [`Fingerprint`] - 32-byte hash binding a record's identity and payload
//! - [`ContentAddress`] - Opaque reference returned by the content store
//! - [`AnchorRef`] - Logical and native ledger references of an anchor
//! - [`EventRecord`] - The persisted metadata record
//! - [`VerificationResult`] - Outcome of an integrity re-check

pub mod error;
pub mod event;
pub mod fingerprint;
pub mod record;
pub mod verification;

pub use error::TypeError;
pub use event::{AnchorState, EventId, EventType};
pub use fingerprint::Fingerprint;
pub use record::{AnchorRef, ContentAddress, EventRecord, FingerprintInput, RegisterRequest};
pub use verification::{AnchorStatus, VerificationResult};
