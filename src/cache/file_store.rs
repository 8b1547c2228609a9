// src/cache/file_store.rs

//! A [`DurableStore`] persisted as one JSON document.
//!
//! The whole map is kept in memory and rewritten on every mutation: written
//! to a temporary file next to the target and renamed over it, so readers
//! never observe a half-written document. A batch is applied to a copy of the
//! map and only committed in memory once the rename succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::cache::durable::{BatchOp, DurableStore, StoreFuture, apply_batch};
use crate::errors::{HammerpackError, Result};

/// Name of the store document inside the cache directory.
pub const STORE_FILE: &str = "cache.json";

#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open (or create) the store under `dir`.
    ///
    /// A document that cannot be parsed is treated as empty: the cache only
    /// ever loses hits, never correctness.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await.map_err(|e| {
            HammerpackError::Storage(format!("creating cache directory {}: {e}", dir.display()))
        })?;

        let path = dir.join(STORE_FILE);
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(text) => match serde_json::from_str::<BTreeMap<String, String>>(&text) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "cache store is corrupt; starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(HammerpackError::Storage(format!(
                    "reading cache store {}: {e}",
                    path.display()
                )));
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "opened file cache store");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        let text = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, text).await.map_err(|e| {
            HammerpackError::Storage(format!("writing {}: {e}", tmp.display()))
        })?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            HammerpackError::Storage(format!("replacing {}: {e}", self.path.display()))
        })?;
        Ok(())
    }

    async fn mutate(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let mut next = entries.clone();
        apply_batch(&mut next, ops);
        self.persist(&next).await?;
        *entries = next;
        Ok(())
    }
}

impl DurableStore for FileStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.entries.lock().await.get(key).cloned()) })
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(self.mutate(vec![BatchOp::Put {
            key: key.to_string(),
            value,
        }]))
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(self.mutate(vec![BatchOp::Del {
            key: key.to_string(),
        }]))
    }

    fn batch(&self, ops: Vec<BatchOp>) -> StoreFuture<'_, ()> {
        Box::pin(self.mutate(ops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let store = FileStore::open(dir.path()).await.unwrap();
            store.put("k", "\"v\"".into()).await.unwrap();
            store
                .batch(vec![
                    BatchOp::Put { key: "a".into(), value: "1".into() },
                    BatchOp::Del { key: "k".into() },
                ])
                .await
                .unwrap();
        }

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn corrupt_document_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(STORE_FILE), "not valid json {{{").unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get("anything").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_persist_leaves_entries_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.put("keep", "1".into()).await.unwrap();

        // A directory where the temp file should go makes the write fail.
        std::fs::create_dir(store.path().with_extension("json.tmp")).unwrap();

        let result = store
            .batch(vec![
                BatchOp::Put { key: "new".into(), value: "2".into() },
                BatchOp::Del { key: "keep".into() },
            ])
            .await;

        assert!(matches!(result, Err(HammerpackError::Storage(_))));
        assert_eq!(store.get("keep").await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.get("new").await.unwrap(), None);
    }
}
