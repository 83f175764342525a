//! Filesystem-backed paste storage.
//!
//! Each paste lives in its own directory under the configured base path,
//! as `<base>/<slug>/index.html`. Guarantees:
//! - Exclusive directory creation is the uniqueness gate: two concurrent
//!   requests can never claim the same slug, with no in-process locking.
//! - A colliding slug grows by one random symbol and retries, so
//!   allocation terminates even when the namespace at the configured
//!   length is exhausted. Final slug length is only lower-bounded.
//! - Stored entries are never overwritten or mutated.

use crate::slug;
use std::io;
use std::path::PathBuf;
use tracing::{debug, info};

/// Canonical file name inside each paste directory.
pub const PASTE_FILE_NAME: &str = "index.html";

/// Filesystem paste store
pub struct PasteStore {
    /// Directory paste entries are created under
    base_dir: PathBuf,
    /// Length of freshly generated slugs
    slug_length: usize,
}

/// A successfully persisted paste
#[derive(Debug)]
pub struct StoredPaste {
    /// Identifier the paste was stored under
    pub slug: String,
    /// Absolute path of the written file
    pub path: PathBuf,
}

impl PasteStore {
    /// Create a store rooted at `base_dir`. The directory itself is
    /// created lazily on first use.
    pub fn new(base_dir: PathBuf, slug_length: usize) -> Self {
        Self {
            base_dir,
            slug_length,
        }
    }

    /// Persist one payload under a freshly reserved slug.
    ///
    /// The payload is written verbatim; an empty payload produces an
    /// empty file. A write failure after reservation leaves the empty
    /// entry behind (no rollback).
    pub async fn store(&self, payload: &[u8]) -> Result<StoredPaste, StoreError> {
        tokio::fs::create_dir_all(&self.base_dir)
            .await
            .map_err(StoreError::CreateBase)?;

        let mut slug = slug::generate(self.slug_length);
        let entry_dir = loop {
            let candidate = self.base_dir.join(&slug);
            match tokio::fs::create_dir(&candidate).await {
                Ok(()) => break candidate,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(slug = %slug, "Slug collision, growing by one symbol");
                    slug::extend(&mut slug);
                }
                Err(e) => return Err(StoreError::Reserve(candidate, e)),
            }
        };

        let path = entry_dir.join(PASTE_FILE_NAME);
        tokio::fs::write(&path, payload)
            .await
            .map_err(|e| StoreError::Write(path.clone(), e))?;

        info!(path = %path.display(), bytes = payload.len(), "Saved paste");
        Ok(StoredPaste { slug, path })
    }
}

/// Fatal storage errors. Slug collisions are handled internally and
/// never surface here.
#[derive(Debug)]
pub enum StoreError {
    CreateBase(io::Error),
    Reserve(PathBuf, io::Error),
    Write(PathBuf, io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::CreateBase(e) => {
                write!(f, "Failed to create base directory: {e}")
            }
            StoreError::Reserve(path, e) => {
                write!(f, "Failed to reserve '{}': {}", path.display(), e)
            }
            StoreError::Write(path, e) => {
                write!(f, "Failed to write '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for StoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = PasteStore::new(dir.path().to_path_buf(), 4);

        let payload = b"fn main() {}\n";
        let stored = store.store(payload).await.unwrap();

        assert_eq!(stored.slug.len(), 4);
        assert_eq!(stored.path, dir.path().join(&stored.slug).join("index.html"));
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_store_empty_payload() {
        let dir = tempfile::tempdir().unwrap();
        let store = PasteStore::new(dir.path().to_path_buf(), 4);

        let stored = store.store(b"").await.unwrap();
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), b"");
    }

    #[tokio::test]
    async fn test_payload_bytes_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let store = PasteStore::new(dir.path().to_path_buf(), 4);

        // Not valid UTF-8, no trailing newline: must come back untouched.
        let payload = [0u8, 159, 146, 150, 13, 10, 0];
        let stored = store.store(&payload).await.unwrap();
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), payload);
    }

    #[tokio::test]
    async fn test_slug_grows_when_namespace_exhausted() {
        let dir = tempfile::tempdir().unwrap();
        let store = PasteStore::new(dir.path().to_path_buf(), 1);

        // Occupy every single-symbol slug so the first reservation must
        // collide and grow.
        for b in b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789" {
            tokio::fs::create_dir(dir.path().join((*b as char).to_string()))
                .await
                .unwrap();
        }

        let stored = store.store(b"overflow").await.unwrap();
        assert!(stored.slug.len() >= 2);
        assert_eq!(tokio::fs::read(&stored.path).await.unwrap(), b"overflow");
    }

    #[tokio::test]
    async fn test_concurrent_stores_get_distinct_slugs() {
        let dir = tempfile::tempdir().unwrap();
        let store = std::sync::Arc::new(PasteStore::new(dir.path().to_path_buf(), 1));

        // Slug length 1 over a 62-symbol alphabet forces collisions.
        let mut handles = Vec::new();
        for i in 0..40u32 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let payload = format!("paste {i}");
                let stored = store.store(payload.as_bytes()).await.unwrap();
                (stored, payload)
            }));
        }

        let mut slugs = std::collections::HashSet::new();
        for handle in handles {
            let (stored, payload) = handle.await.unwrap();
            assert!(slugs.insert(stored.slug.clone()), "slug allocated twice");
            let content = tokio::fs::read(&stored.path).await.unwrap();
            assert_eq!(content, payload.as_bytes());
        }
        assert_eq!(slugs.len(), 40);
    }

    #[tokio::test]
    async fn test_fatal_error_when_base_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("occupied");
        tokio::fs::write(&blocker, b"not a directory").await.unwrap();

        let store = PasteStore::new(blocker, 4);
        match store.store(b"payload").await {
            Err(StoreError::CreateBase(_)) | Err(StoreError::Reserve(_, _)) => {}
            other => panic!("expected fatal store error, got {other:?}"),
        }
    }
}
