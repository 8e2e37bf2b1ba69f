//! JSON-file-backed metadata store.
//!
//! The whole table is rewritten after every mutation through a temporary
//! file in the same directory and an atomic rename, so the file on disk is
//! always a complete snapshot. Suitable for single-process deployments and
//! demos; the table is loaded into memory on open.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use custody_types::{AnchorRef, AnchorState, EventId, EventRecord};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{MetaError, MetaResult};
use crate::table::RecordTable;
use crate::traits::MetadataStore;

/// A [`MetadataStore`] persisted as a single JSON document.
#[derive(Debug)]
pub struct FileMetadataStore {
    path: PathBuf,
    table: Mutex<RecordTable>,
}

impl FileMetadataStore {
    /// Open the store at `path`, loading existing records if the file exists.
    pub fn open(path: impl Into<PathBuf>) -> MetaResult<Self> {
        let path = path.into();
        let table = if path.exists() {
            let data = fs::read(&path)?;
            serde_json::from_slice(&data).map_err(|e| MetaError::Serialization(e.to_string()))?
        } else {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            RecordTable::new()
        };
        debug!(path = %path.display(), records = table.len(), "metadata store opened");
        Ok(Self {
            path,
            table: Mutex::new(table),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a mutation and persist the result.
    ///
    /// The in-memory table only changes if the snapshot was written. The
    /// lock is held across the write so snapshots land in mutation order.
    async fn mutate(&self, f: impl FnOnce(&mut RecordTable) -> MetaResult<()>) -> MetaResult<()> {
        let mut table = self.table.lock().await;
        let mut next = table.clone();
        f(&mut next)?;
        let data =
            serde_json::to_vec_pretty(&next).map_err(|e| MetaError::Serialization(e.to_string()))?;

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_snapshot(&path, &data))
            .await
            .map_err(|e| MetaError::Unavailable(format!("write task failed: {e}")))??;
        *table = next;
        Ok(())
    }

    async fn read<T>(&self, f: impl FnOnce(&RecordTable) -> MetaResult<T>) -> MetaResult<T> {
        let table = self.table.lock().await;
        f(&table)
    }
}

fn write_snapshot(path: &Path, data: &[u8]) -> MetaResult<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| MetaError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl MetadataStore for FileMetadataStore {
    async fn put(&self, record: &EventRecord) -> MetaResult<()> {
        self.mutate(|t| t.insert(record.clone())).await
    }

    async fn get_by_id(&self, id: &EventId) -> MetaResult<EventRecord> {
        self.read(|t| t.get(id).cloned()).await
    }

    async fn scan_by_product(&self, product_id: &str) -> MetaResult<Vec<EventRecord>> {
        self.read(|t| Ok(t.scan_by_product(product_id))).await
    }

    async fn scan_all(&self, limit: Option<usize>) -> MetaResult<Vec<EventRecord>> {
        self.read(|t| Ok(t.scan_all(limit))).await
    }

    async fn update_state(&self, id: &EventId, state: AnchorState) -> MetaResult<()> {
        self.mutate(|t| t.set_state(id, state, Utc::now())).await
    }

    async fn update_anchor(&self, id: &EventId, anchor: &AnchorRef) -> MetaResult<()> {
        self.mutate(|t| t.set_anchor(id, anchor, Utc::now())).await
    }

    async fn ping(&self) -> MetaResult<()> {
        self.read(|_| Ok(())).await
    }
}
