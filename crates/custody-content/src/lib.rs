//! Content-addressed payload storage for the custody ledger.
//!
//! Event payloads are kept off-ledger in a content store. A payload is
//! identified by a [`ContentAddress`] derived from a domain-separated
//! BLAKE3 hash of its bytes, so the address alone is enough to detect
//! whether the bytes handed back later are the bytes that were stored.
//!
//! # Storage Backends
//!
//! All backends implement the [`ContentStore`] trait:
//!
//! - [`InMemoryContentStore`] -- `HashMap`-based store for tests and embedding
//! - [`FsContentStore`] -- durable files under a root directory
//!
//! # Design Rules
//!
//! 1. Content is immutable once written; writing the same bytes twice is a no-op.
//! 2. A successful `put` means the content is durable (pinned), not merely cached.
//! 3. The store never interprets payload contents.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod error;
pub mod fs;
pub mod memory;
pub mod traits;

pub use custody_types::ContentAddress;
pub use error::{ContentError, ContentResult};
pub use fs::FsContentStore;
pub use memory::InMemoryContentStore;
pub use traits::{address_of, ContentStore};
