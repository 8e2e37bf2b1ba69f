use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use custody_types::ContentAddress;

use crate::error::{ContentError, ContentResult};
use crate::traits::{address_of, ContentStore};

/// In-memory, HashMap-based content store.
///
/// Intended for tests and embedding. Content is held behind a `RwLock` and
/// cloned on read. The store can be taken offline to exercise outage
/// handling in callers.
pub struct InMemoryContentStore {
    objects: RwLock<HashMap<ContentAddress, Vec<u8>>>,
    online: AtomicBool,
}

impl InMemoryContentStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            online: AtomicBool::new(true),
        }
    }

    /// Number of payloads currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.read().expect("lock poisoned").is_empty()
    }

    /// Total bytes across all stored payloads.
    pub fn total_bytes(&self) -> u64 {
        self.objects
            .read()
            .expect("lock poisoned")
            .values()
            .map(|data| data.len() as u64)
            .sum()
    }

    /// Simulate the backend becoming unreachable (or reachable again).
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Overwrite the bytes behind an address without re-hashing.
    ///
    /// Models a content node serving different bytes than were pinned.
    /// Only fault-injection code should call this.
    pub fn replace_unchecked(&self, address: &ContentAddress, data: Vec<u8>) {
        self.objects
            .write()
            .expect("lock poisoned")
            .insert(address.clone(), data);
    }

    fn ensure_online(&self) -> ContentResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ContentError::Unavailable("in-memory store is offline".into()))
        }
    }
}

impl Default for InMemoryContentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn put(&self, data: &[u8]) -> ContentResult<ContentAddress> {
        self.ensure_online()?;
        let address = address_of(data);
        let mut map = self.objects.write().expect("lock poisoned");
        map.entry(address.clone()).or_insert_with(|| data.to_vec());
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> ContentResult<Vec<u8>> {
        self.ensure_online()?;
        let map = self.objects.read().expect("lock poisoned");
        map.get(address)
            .cloned()
            .ok_or_else(|| ContentError::NotFound(address.clone()))
    }

    async fn ping(&self) -> ContentResult<()> {
        self.ensure_online()
    }
}

impl std::fmt::Debug for InMemoryContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryContentStore")
            .field("object_count", &self.len())
            .field("online", &self.online.load(Ordering::SeqCst))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[tokio::test]
    async fn put_and_get() {
        let store = InMemoryContentStore::new();
        let addr = store.put(br#"{"lot":"12345"}"#).await.unwrap();
        assert!(!addr.is_empty());
        assert_eq!(store.get(&addr).await.unwrap(), br#"{"lot":"12345"}"#);
    }

    #[tokio::test]
    async fn empty_payload_roundtrips() {
        let store = InMemoryContentStore::new();
        let addr = store.put(b"").await.unwrap();
        assert_eq!(store.get(&addr).await.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn duplicate_put_is_idempotent() {
        let store = InMemoryContentStore::new();
        let a = store.put(b"same").await.unwrap();
        let b = store.put(b"same").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);
        assert_eq!(store.total_bytes(), 4);
    }

    #[tokio::test]
    async fn missing_address_is_not_found() {
        let store = InMemoryContentStore::new();
        let err = store.get(&address_of(b"never stored")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn offline_store_is_unavailable() {
        let store = InMemoryContentStore::new();
        let addr = store.put(b"x").await.unwrap();
        store.set_online(false);
        assert!(matches!(store.ping().await, Err(ContentError::Unavailable(_))));
        assert!(matches!(store.put(b"y").await, Err(ContentError::Unavailable(_))));
        assert!(matches!(store.get(&addr).await, Err(ContentError::Unavailable(_))));
        store.set_online(true);
        assert!(store.ping().await.is_ok());
    }

    #[tokio::test]
    async fn replaced_content_is_served_as_is() {
        let store = InMemoryContentStore::new();
        let addr = store.put(b"original").await.unwrap();
        store.replace_unchecked(&addr, b"tampered".to_vec());
        assert_eq!(store.get(&addr).await.unwrap(), b"tampered");
    }

    proptest! {
        #[test]
        fn any_bytes_roundtrip(data in proptest::collection::vec(any::<u8>(), 0..512)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let store = InMemoryContentStore::new();
            let fetched = rt.block_on(async {
                let addr = store.put(&data).await.unwrap();
                store.get(&addr).await.unwrap()
            });
            prop_assert_eq!(fetched, data);
        }
    }
}
