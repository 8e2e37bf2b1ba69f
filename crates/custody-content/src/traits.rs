use async_trait::async_trait;
use custody_crypto::ContentHasher;
use custody_types::ContentAddress;

use crate::error::ContentResult;

/// Prefix marking a BLAKE3-derived content address.
pub(crate) const ADDRESS_PREFIX: &str = "b3";

/// The address under which `data` is stored by the built-in backends.
pub fn address_of(data: &[u8]) -> ContentAddress {
    ContentAddress::new(format!(
        "{ADDRESS_PREFIX}{}",
        ContentHasher::CONTENT.hash_hex(data)
    ))
}

/// Returns `true` if `address` has the shape produced by [`address_of`].
pub(crate) fn is_well_formed(address: &ContentAddress) -> bool {
    address
        .as_str()
        .strip_prefix(ADDRESS_PREFIX)
        .is_some_and(|h| h.len() == 64 && h.bytes().all(|b| b.is_ascii_hexdigit()))
}

/// Content-addressed payload store.
///
/// All implementations must satisfy these invariants:
/// - `get(put(bytes)) == bytes` for any byte string, including the empty one.
/// - Writes are idempotent: the same bytes always produce the same address.
/// - `put` returns only once the content is durable.
/// - Concurrent reads are always safe (content is immutable).
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Store bytes and return their address.
    async fn put(&self, data: &[u8]) -> ContentResult<ContentAddress>;

    /// Fetch the bytes stored under `address`.
    ///
    /// Returns [`ContentError::NotFound`](crate::ContentError::NotFound) if
    /// nothing is stored there.
    async fn get(&self, address: &ContentAddress) -> ContentResult<Vec<u8>>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> ContentResult<()>;
}
