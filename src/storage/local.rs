//! Local filesystem snapshot backend.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::storage::{SNAPSHOT_KEY, SnapshotStorage};

/// Stores the snapshot as a file under a root directory.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    /// Get the full path for a relative key.
    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl SnapshotStorage for LocalStorage {
    async fn load(&self) -> Result<Option<Vec<u8>>> {
        self.read_bytes(SNAPSHOT_KEY).await
    }

    async fn save(&self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(SNAPSHOT_KEY, bytes).await?;
        log::debug!("Wrote {} bytes to {}", bytes.len(), self.location());
        Ok(())
    }

    fn location(&self) -> String {
        self.path(SNAPSHOT_KEY).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        storage.save(b"hello").await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(b"hello".to_vec()));

        storage.save(b"replaced").await.unwrap();
        assert_eq!(storage.load().await.unwrap(), Some(b"replaced".to_vec()));
        assert!(!tmp.path().join("history.tmp").exists());
    }

    #[tokio::test]
    async fn test_load_nonexistent() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("not-created-yet"));
        assert!(storage.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_creates_root_dir() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested/dir"));
        storage.save(b"{}").await.unwrap();
        assert!(tmp.path().join("nested/dir/history.json").exists());
        assert!(storage.location().ends_with("history.json"));
    }
}
