//! Local cache of pending payloads, keyed by file id.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;

use gitbox_common::{Error, Result};

/// Key-value store for file payloads waiting to be uploaded.
#[async_trait]
pub trait BlobCache: Send + Sync {
    /// Store the payload for `id`, replacing any previous one.
    async fn put(&self, id: &str, data: &[u8]) -> Result<()>;

    /// Payload for `id`, if cached.
    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>>;

    /// Drop the payload for `id`. Removing a missing id is not an error.
    async fn remove(&self, id: &str) -> Result<()>;
}

/// Cache storing one file per payload in a directory.
pub struct FsBlobCache {
    root: PathBuf,
}

impl FsBlobCache {
    /// Cache rooted at `root` (created on first write).
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// File path for `id`. Ids are hex, anything else is rejected.
    fn blob_path(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::InvalidInput(format!("Invalid file id: {}", id)));
        }
        Ok(self.root.join(id))
    }
}

#[async_trait]
impl BlobCache for FsBlobCache {
    async fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        let path = self.blob_path(id)?;
        fs::create_dir_all(&self.root).await?;
        fs::write(path, data).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.blob_path(id)?;
        match fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    async fn remove(&self, id: &str) -> Result<()> {
        let path = self.blob_path(id)?;
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// In-memory cache for testing.
#[derive(Default)]
pub struct MemoryBlobCache {
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached payloads.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl BlobCache for MemoryBlobCache {
    async fn put(&self, id: &str, data: &[u8]) -> Result<()> {
        self.blobs.write().await.insert(id.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().await.get(id).cloned())
    }

    async fn remove(&self, id: &str) -> Result<()> {
        self.blobs.write().await.remove(id);
        Ok(())
    }
}
