//! # Blob Storage
//!
//! The engine never interprets file bytes. It hands them to a [`BlobStore`]
//! under an opaque key of the form `case/product/document` and keeps only
//! the key, size and digest in the document record.
//!
//! Two implementations ship with the engine: [`MemoryBlobStore`] for tests
//! and single-process deployments, [`FsBlobStore`] for a local directory.
//! Object storage can be plugged in behind the same trait.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use dossier_core::DossierError;
use thiserror::Error;

/// Errors from a blob store.
#[derive(Error, Debug)]
pub enum BlobError {
    /// No blob stored under the key.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The key would escape the store root or is empty.
    #[error("invalid blob key: {0}")]
    InvalidKey(String),

    /// Underlying filesystem failure.
    #[error("blob I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BlobError> for DossierError {
    fn from(err: BlobError) -> Self {
        DossierError::Storage(err.to_string())
    }
}

/// Byte storage for uploaded documents.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Store `bytes` under `key`, replacing any previous content.
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), BlobError>;

    /// Fetch the bytes stored under `key`.
    async fn get(&self, key: &str) -> Result<Bytes, BlobError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BlobError>;

    /// Short name for logs.
    fn kind(&self) -> &'static str;
}

// ---------------------------------------------------------------------------
// In-memory
// ---------------------------------------------------------------------------

/// Blob store backed by a `DashMap`.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, Bytes>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

impl std::fmt::Debug for MemoryBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBlobStore")
            .field("blobs_count", &self.blobs.len())
            .finish()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), BlobError> {
        validate_key(key)?;
        self.blobs.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        self.blobs
            .get(key)
            .map(|b| b.value().clone())
            .ok_or_else(|| BlobError::NotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        self.blobs.remove(key);
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}

// ---------------------------------------------------------------------------
// Filesystem
// ---------------------------------------------------------------------------

/// Blob store rooted at a local directory.
///
/// Writes go to a temporary sibling file first and are renamed into place,
/// so a reader never sees a partially written blob.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: Bytes) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("partial");
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn kind(&self) -> &'static str {
        "filesystem"
    }
}

/// Keys are relative paths made of normal components only.
fn validate_key(key: &str) -> Result<(), BlobError> {
    let path = Path::new(key);
    let only_normal = path
        .components()
        .all(|c| matches!(c, Component::Normal(_)));
    if key.is_empty() || !only_normal {
        return Err(BlobError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_put_get_delete() {
        let store = MemoryBlobStore::new();
        store.put("a/b/c", Bytes::from_static(b"pdf")).await.unwrap();
        assert_eq!(store.get("a/b/c").await.unwrap(), Bytes::from_static(b"pdf"));
        store.delete("a/b/c").await.unwrap();
        assert!(matches!(store.get("a/b/c").await, Err(BlobError::NotFound(_))));
        store.delete("a/b/c").await.unwrap();
    }

    #[tokio::test]
    async fn fs_store_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("case/prod/doc", Bytes::from_static(b"one")).await.unwrap();
        store.put("case/prod/doc", Bytes::from_static(b"two")).await.unwrap();
        assert_eq!(store.get("case/prod/doc").await.unwrap(), Bytes::from_static(b"two"));
        assert!(!dir.path().join("case/prod/doc.partial").exists());
        store.delete("case/prod/doc").await.unwrap();
        assert!(matches!(store.get("case/prod/doc").await, Err(BlobError::NotFound(_))));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        for key in ["../escape", "/abs/path", "", "a/../../b"] {
            assert!(matches!(
                store.put(key, Bytes::new()).await,
                Err(BlobError::InvalidKey(_))
            ));
        }
    }

    #[test]
    fn blob_errors_are_storage_errors() {
        let err: DossierError = BlobError::NotFound("k".into()).into();
        assert_eq!(err.code(), "InternalError");
    }
}
