// src/cache/durable.rs

//! The durable tier behind a [`TieredCache`](super::TieredCache).
//!
//! A store holds encoded text values under string keys. Not-found is a normal
//! `Ok(None)`, never an error.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use crate::errors::Result;

pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// One operation in an atomic [`DurableStore::batch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: String, value: String },
    Del { key: String },
}

impl BatchOp {
    pub fn key(&self) -> &str {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Del { key } => key,
        }
    }
}

/// Trait abstracting the persisted key-value tier.
///
/// Production code uses [`FileStore`](super::FileStore); tests use
/// [`MemoryStore`] or fakes that fail or block on demand.
pub trait DurableStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>>;

    fn put<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()>;

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()>;

    /// Apply every op or none of them.
    fn batch(&self, ops: Vec<BatchOp>) -> StoreFuture<'_, ()>;
}

/// Ordered in-memory store. Durable only for the life of the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Snapshot of the stored entries.
    pub fn entries(&self) -> BTreeMap<String, String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl DurableStore for MemoryStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        Box::pin(async move { Ok(self.lock().get(key).cloned()) })
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.lock().insert(key.to_string(), value);
            Ok(())
        })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.lock().remove(key);
            Ok(())
        })
    }

    fn batch(&self, ops: Vec<BatchOp>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut entries = self.lock();
            apply_batch(&mut entries, ops);
            Ok(())
        })
    }
}

pub(crate) fn apply_batch(entries: &mut BTreeMap<String, String>, ops: Vec<BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Put { key, value } => {
                entries.insert(key, value);
            }
            BatchOp::Del { key } => {
                entries.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_none_not_error() {
        let store = MemoryStore::new();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn batch_applies_in_order() {
        let store = MemoryStore::new();
        store.put("a", "1".into()).await.unwrap();

        store
            .batch(vec![
                BatchOp::Put { key: "b".into(), value: "2".into() },
                BatchOp::Del { key: "a".into() },
                BatchOp::Put { key: "a".into(), value: "3".into() },
            ])
            .await
            .unwrap();

        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("3"));
        assert_eq!(store.get("b").await.unwrap().as_deref(), Some("2"));
        assert_eq!(store.len(), 2);
    }
}
