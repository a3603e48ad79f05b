//! Local filesystem storage for the watch list.
//!
//! Writes go to a sibling `.tmp` file that is then renamed over the target,
//! so a crash mid-write leaves the previous list intact.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::WatchStore;
use crate::storage::{WATCHES_FILE, WatchStorage};

/// JSON file backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a LocalStorage rooted at the given state directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn watches_path(&self) -> PathBuf {
        self.root_dir.join(WATCHES_FILE)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Read bytes, returning None if the file doesn't exist.
    async fn read_bytes(path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

#[async_trait]
impl WatchStorage for LocalStorage {
    async fn load(&self) -> Result<WatchStore> {
        let path = self.watches_path();
        match Self::read_bytes(&path).await? {
            Some(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(WatchStore::default()),
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => {
                log::debug!("no watch list at {}", path.display());
                Ok(WatchStore::default())
            }
        }
    }

    async fn save(&self, store: &WatchStore) -> Result<()> {
        let path = self.watches_path();
        let mut bytes = serde_json::to_vec_pretty(store)?;
        bytes.push(b'\n');
        Self::write_bytes(&path, &bytes).await?;
        log::debug!("saved {} watches to {}", store.watches.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::models::{SearchQuery, Watch};

    #[tokio::test]
    async fn test_missing_file_is_empty_store() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("nested"));

        let store = storage.load().await.unwrap();
        assert!(store.watches.is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("state"));

        let mut watch = Watch::new("w_1", "Athens", SearchQuery::new("SFO", "ATH", "2026-06-10"));
        watch.target_price = 700;
        watch.last_lowest_price = 650;
        let store = WatchStore {
            watches: vec![watch],
        };

        storage.save(&store).await.unwrap();
        assert!(storage.watches_path().exists());
        assert!(!storage.watches_path().with_extension("tmp").exists());

        let loaded = storage.load().await.unwrap();
        assert_eq!(loaded, store);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        tokio::fs::write(storage.watches_path(), b"{not json")
            .await
            .unwrap();

        assert!(matches!(storage.load().await, Err(AppError::Json(_))));
    }

    #[tokio::test]
    async fn test_blank_file_is_empty_store() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        tokio::fs::write(storage.watches_path(), b"\n").await.unwrap();

        assert!(storage.load().await.unwrap().watches.is_empty());
    }
}
