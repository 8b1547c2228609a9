// src/cache/file_cache.rs

//! Content-addressed per-file entries on top of a shared [`TieredCache`].
//!
//! An entry is looked up by `(relative filename, content hash)`, so a changed
//! file can never hit a stale entry: its new hash is a different key.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::cache::keys::AsCacheKey;
use crate::cache::tiered::TieredCache;
use crate::errors::Result;

/// What a transform produced for one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCacheValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub definition_text: Option<String>,
    /// Files this one pulled in; re-added to the watch set on a hit.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct IncrementalFileCache {
    cache: Arc<TieredCache>,
}

impl IncrementalFileCache {
    pub fn new(cache: Arc<TieredCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    /// Look up a file entry. An entry that does not decode as a
    /// [`FileCacheValue`] is a miss.
    pub async fn get_file<K: AsCacheKey + ?Sized>(&self, key: &K) -> Result<Option<FileCacheValue>> {
        let key = key.as_cache_key()?;
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };

        match serde_json::from_value(raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "cached file entry has unexpected shape; treating as miss");
                Ok(None)
            }
        }
    }

    /// Queue a file entry in memory; it reaches the durable tier on the next
    /// [`flush_writes`](Self::flush_writes).
    pub fn set_file<K: AsCacheKey + ?Sized>(&self, key: &K, value: &FileCacheValue) -> Result<()> {
        let key = key.as_cache_key()?;
        let value = serde_json::to_value(value)?;
        self.cache.set_mem_sync(key.into_owned(), value);
        Ok(())
    }

    pub async fn flush_writes(&self) -> Result<()> {
        self.cache.flush().await
    }

    pub async fn get_plugin<K: AsCacheKey + ?Sized>(&self, key: &K) -> Result<Option<Value>> {
        let key = key.as_cache_key()?;
        self.cache.get(&key).await
    }

    pub fn set_plugin<K: AsCacheKey + ?Sized>(
        &self,
        key: &K,
        value: impl Into<Option<Value>>,
    ) -> Result<()> {
        let key = key.as_cache_key()?;
        self.cache.set_mem_sync(key.into_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::durable::{DurableStore, MemoryStore};
    use crate::cache::keys::{FileCacheKey, PluginCacheKey};
    use serde_json::json;

    fn bundle(text: &str) -> FileCacheValue {
        FileCacheValue {
            transformed_text: Some(text.to_string()),
            map_text: None,
            definition_text: Some("decl".into()),
            dependencies: vec!["b.ts".into()],
        }
    }

    #[tokio::test]
    async fn structured_and_composed_keys_are_interchangeable() {
        let files = IncrementalFileCache::new(Arc::new(TieredCache::volatile_only()));
        let key = FileCacheKey::new("a.ts", "h1");

        files.set_file(&key, &bundle("out")).unwrap();

        assert_eq!(files.get_file("a.ts:h1").await.unwrap(), Some(bundle("out")));
        assert_eq!(files.get_file(&key).await.unwrap(), Some(bundle("out")));
        assert_eq!(files.get_file(&FileCacheKey::new("a.ts", "h2")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn values_are_stored_camel_case() {
        let store = Arc::new(MemoryStore::new());
        let files = IncrementalFileCache::new(Arc::new(TieredCache::with_store(store.clone())));
        files.set_file("a.ts:h", &bundle("x")).unwrap();
        files.flush_writes().await.unwrap();

        let raw = store.get("a.ts:h").await.unwrap().unwrap();
        assert!(raw.contains("\"transformedText\":\"x\""));
        assert!(raw.contains("\"definitionText\""));
        assert!(!raw.contains("mapText"));
    }

    #[tokio::test]
    async fn wrong_shape_is_a_miss() {
        let cache = Arc::new(TieredCache::volatile_only());
        cache.set_mem_sync("a.ts:h", json!({ "dependencies": "not-a-list" }));
        let files = IncrementalFileCache::new(cache);

        assert_eq!(files.get_file("a.ts:h").await.unwrap(), None);
    }

    #[tokio::test]
    async fn plugin_entries_share_the_cache() {
        let files = IncrementalFileCache::new(Arc::new(TieredCache::volatile_only()));
        let key = PluginCacheKey::new("compile", Some("options".into()));

        files.set_plugin(&key, json!({ "strict": true })).unwrap();

        assert_eq!(
            files.cache().get_mem_sync("compile:options"),
            Some(json!({ "strict": true }))
        );
        assert_eq!(
            files.get_plugin("compile:options").await.unwrap(),
            Some(json!({ "strict": true }))
        );
    }
}
