//! Event-record metadata storage for the custody ledger.
//!
//! The metadata store is the fast, indexed copy of every [`EventRecord`]. It
//! is written synchronously at intake and updated exactly once more when
//! the detached anchoring attempt settles.
//!
//! Backends implement [`MetadataStore`]:
//!
//! - [`InMemoryMetadataStore`] -- lock-protected table for tests and embedding
//! - [`FileMetadataStore`] -- the same table persisted as JSON after every mutation
//!
//! Both enforce the record lifecycle (`pending -> confirmed | failed`) and
//! the anchor/state pairing, so no caller can push a record backwards.

pub mod error;
pub mod file;
pub mod memory;
pub mod table;
pub mod traits;

pub use custody_types::EventRecord;
pub use error::{MetaError, MetaResult};
pub use file::FileMetadataStore;
pub use memory::InMemoryMetadataStore;
pub use table::RecordTable;
pub use traits::MetadataStore;
