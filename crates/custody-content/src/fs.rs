use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use custody_types::ContentAddress;
use tracing::debug;

use crate::error::{ContentError, ContentResult};
use crate::traits::{address_of, is_well_formed, ContentStore, ADDRESS_PREFIX};

/// Durable content store keeping one file per payload.
///
/// On-disk layout mirrors a git object directory:
/// ```text
/// <root>/<first two hash digits>/<full address>
/// ```
/// Payloads are written to a temporary file in the same directory, synced,
/// and atomically renamed into place, so a crash never leaves a partial
/// payload under a valid address. Reads re-hash the bytes and report
/// [`ContentError::Corrupt`] on mismatch.
#[derive(Debug, Clone)]
pub struct FsContentStore {
    root: PathBuf,
}

impl FsContentStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> ContentResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, address: &ContentAddress) -> ContentResult<PathBuf> {
        if !is_well_formed(address) {
            return Err(ContentError::InvalidAddress(address.to_string()));
        }
        let digits = &address.as_str()[ADDRESS_PREFIX.len()..];
        Ok(self.root.join(&digits[..2]).join(address.as_str()))
    }
}

fn write_durable(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "content path has no parent"))?;
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn put(&self, data: &[u8]) -> ContentResult<ContentAddress> {
        let address = address_of(data);
        let path = self.path_for(&address)?;
        if path.exists() {
            debug!(%address, "content already stored");
            return Ok(address);
        }

        let bytes = data.to_vec();
        tokio::task::spawn_blocking(move || write_durable(&path, &bytes))
            .await
            .map_err(|e| ContentError::Unavailable(format!("write task failed: {e}")))??;
        debug!(%address, size = data.len(), "content stored");
        Ok(address)
    }

    async fn get(&self, address: &ContentAddress) -> ContentResult<Vec<u8>> {
        let path = self.path_for(address)?;
        let data = match tokio::fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ContentError::NotFound(address.clone()))
            }
            Err(e) => return Err(e.into()),
        };

        let computed = address_of(&data);
        if computed != *address {
            return Err(ContentError::Corrupt {
                address: address.clone(),
                reason: format!("stored bytes hash to {computed}"),
            });
        }
        Ok(data)
    }

    async fn ping(&self) -> ContentResult<()> {
        let meta = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| ContentError::Unavailable(format!("{}: {e}", self.root.display())))?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(ContentError::Unavailable(format!(
                "{} is not a directory",
                self.root.display()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let addr = store.put(b"pallet 42").await.unwrap();
        assert_eq!(store.get(&addr).await.unwrap(), b"pallet 42");
    }

    #[tokio::test]
    async fn content_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let addr = {
            let store = FsContentStore::open(dir.path()).unwrap();
            store.put(b"durable").await.unwrap()
        };
        let reopened = FsContentStore::open(dir.path()).unwrap();
        assert_eq!(reopened.get(&addr).await.unwrap(), b"durable");
    }

    #[tokio::test]
    async fn empty_payload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let addr = store.put(b"").await.unwrap();
        assert!(store.get(&addr).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn tampered_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        let addr = store.put(b"original").await.unwrap();
        fs::write(store.path_for(&addr).unwrap(), b"tampered").unwrap();
        assert!(matches!(
            store.get(&addr).await,
            Err(ContentError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn missing_and_malformed_addresses() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path()).unwrap();
        assert!(store.get(&address_of(b"nope")).await.unwrap_err().is_not_found());
        assert!(matches!(
            store.get(&ContentAddress::new("b3../../secret")).await,
            Err(ContentError::InvalidAddress(_))
        ));
    }

    #[tokio::test]
    async fn ping_checks_root() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsContentStore::open(dir.path().join("objects")).unwrap();
        assert!(store.ping().await.is_ok());
        fs::remove_dir_all(store.root()).unwrap();
        assert!(matches!(store.ping().await, Err(ContentError::Unavailable(_))));
    }
}
