//! Default [`ObjectStore`] backend: a content-addressed directory tree
//! keyed by the BLAKE3 hash of the stored bytes, sharded two levels deep
//! to keep any one directory small.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use super::ObjectStore;
use crate::types::ObjectHandle;
use crate::{CacheError, Result};

pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, hash: &str) -> PathBuf {
        self.root.join(&hash[0..2]).join(&hash[2..4]).join(hash)
    }

    fn path_for_handle(&self, handle: &ObjectHandle) -> PathBuf {
        self.path_for(handle.as_str())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn put(&self, bytes: &[u8]) -> Result<ObjectHandle> {
        let hash = blake3::hash(bytes).to_hex().to_string();
        let path = self.path_for(&hash);
        if fs::try_exists(&path).await.map_err(|e| CacheError::ObjectStore(e.to_string()))? {
            return Ok(ObjectHandle::new(hash));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| CacheError::ObjectStore(e.to_string()))?;
        }
        let tmp_path = tmp_path_for(&path);
        fs::write(&tmp_path, bytes)
            .await
            .map_err(|e| CacheError::ObjectStore(e.to_string()))?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| CacheError::ObjectStore(e.to_string()))?;
        Ok(ObjectHandle::new(hash))
    }

    async fn get(&self, handle: &ObjectHandle) -> Result<Option<Vec<u8>>> {
        let path = self.path_for_handle(handle);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::ObjectStore(e.to_string())),
        }
    }

    async fn delete(&self, handle: &ObjectHandle) -> Result<()> {
        let path = self.path_for_handle(handle);
        match fs::remove_file(&path).await {
            Ok(()) | Err(_) if !path.exists() => Ok(()),
            Err(e) => Err(CacheError::ObjectStore(e.to_string())),
        }
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    path.with_extension(format!("tmp-{}", std::process::id()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_then_get_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let handle = store.put(b"hello world").await.unwrap();
        let bytes = store.get(&handle).await.unwrap().unwrap();
        assert_eq!(bytes, b"hello world");
    }

    #[tokio::test]
    async fn identical_content_dedupes_to_same_handle() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let a = store.put(b"same bytes").await.unwrap();
        let b = store.put(b"same bytes").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn get_missing_handle_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let missing = ObjectHandle::new("0".repeat(64));
        assert!(store.get(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_missing_handle_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path());
        let missing = ObjectHandle::new("0".repeat(64));
        store.delete(&missing).await.unwrap();
    }
}
