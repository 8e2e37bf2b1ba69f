//! In-memory metadata store for testing and ephemeral use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use custody_types::{AnchorRef, AnchorState, EventId, EventRecord};

use crate::error::{MetaError, MetaResult};
use crate::table::RecordTable;
use crate::traits::MetadataStore;

/// An in-memory implementation of [`MetadataStore`].
///
/// All data lives in a [`RecordTable`] behind a `RwLock`; it is lost when
/// the store is dropped. The store can be taken offline to exercise
/// outage handling in callers.
#[derive(Debug)]
pub struct InMemoryMetadataStore {
    table: RwLock<RecordTable>,
    online: AtomicBool,
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(RecordTable::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.table.read().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> MetaResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(MetaError::Unavailable("in-memory store is offline".into()))
        }
    }

    fn read<T>(&self, f: impl FnOnce(&RecordTable) -> MetaResult<T>) -> MetaResult<T> {
        self.ensure_online()?;
        let table = self
            .table
            .read()
            .map_err(|e| MetaError::Unavailable(format!("lock poisoned: {e}")))?;
        f(&table)
    }

    fn write<T>(&self, f: impl FnOnce(&mut RecordTable) -> MetaResult<T>) -> MetaResult<T> {
        self.ensure_online()?;
        let mut table = self
            .table
            .write()
            .map_err(|e| MetaError::Unavailable(format!("lock poisoned: {e}")))?;
        f(&mut table)
    }
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    async fn put(&self, record: &EventRecord) -> MetaResult<()> {
        self.write(|t| t.insert(record.clone()))
    }

    async fn get_by_id(&self, id: &EventId) -> MetaResult<EventRecord> {
        self.read(|t| t.get(id).cloned())
    }

    async fn scan_by_product(&self, product_id: &str) -> MetaResult<Vec<EventRecord>> {
        self.read(|t| Ok(t.scan_by_product(product_id)))
    }

    async fn scan_all(&self, limit: Option<usize>) -> MetaResult<Vec<EventRecord>> {
        self.read(|t| Ok(t.scan_all(limit)))
    }

    async fn update_state(&self, id: &EventId, state: AnchorState) -> MetaResult<()> {
        self.write(|t| t.set_state(id, state, Utc::now()))
    }

    async fn update_anchor(&self, id: &EventId, anchor: &AnchorRef) -> MetaResult<()> {
        self.write(|t| t.set_anchor(id, anchor, Utc::now()))
    }

    async fn ping(&self) -> MetaResult<()> {
        self.ensure_online()
    }
}
