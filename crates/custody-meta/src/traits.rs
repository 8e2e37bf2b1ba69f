//! The [`MetadataStore`] trait defining the record storage interface.

use async_trait::async_trait;
use custody_types::{AnchorRef, AnchorState, EventId, EventRecord};

use crate::error::MetaResult;

/// Storage backend for event records.
///
/// Implementations must be thread-safe and apply each update atomically:
/// a reader sees either the record before an update or after it, never a
/// mix. Scans are full-table and return records in stored (insertion)
/// order; they are correct but not indexed.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Persist a new record. Fails if the id is already present.
    async fn put(&self, record: &EventRecord) -> MetaResult<()>;

    /// Read a record by id.
    async fn get_by_id(&self, id: &EventId) -> MetaResult<EventRecord>;

    /// All records for a product, in stored order.
    async fn scan_by_product(&self, product_id: &str) -> MetaResult<Vec<EventRecord>>;

    /// Up to `limit` records in stored order; `None` returns everything.
    async fn scan_all(&self, limit: Option<usize>) -> MetaResult<Vec<EventRecord>>;

    /// Move a pending record to a terminal state.
    ///
    /// Only `Failed` is accepted here; confirmation requires references and
    /// goes through [`Self::update_anchor`].
    async fn update_state(&self, id: &EventId, state: AnchorState) -> MetaResult<()>;

    /// Record the ledger references of a pending record and mark it
    /// `Confirmed`, as a single update.
    async fn update_anchor(&self, id: &EventId, anchor: &AnchorRef) -> MetaResult<()>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> MetaResult<()>;
}
