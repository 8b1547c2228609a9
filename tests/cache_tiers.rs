// tests/cache_tiers.rs

use std::sync::Arc;

use hammerpack::cache::{
    DurableStore, FileCacheKey, FileCacheValue, FileStore, IncrementalFileCache, MemoryStore,
    TieredCache, content_hash,
};
use hammerpack::errors::HammerpackError;
use hammerpack_test_utils::fake_store::{FailingStore, GatedStore};
use hammerpack_test_utils::{init_tracing, with_timeout};
use serde_json::{Value, json};

#[tokio::test]
async fn values_round_trip_through_the_durable_tier() {
    let store = Arc::new(MemoryStore::new());
    let writer = TieredCache::with_store(store.clone());
    let nested = json!({
        "list": [1, null, "two", { "deep": [null, null] }],
        "flag": false,
        "n": 1.5,
    });
    writer.set_mem_sync("k", nested.clone());
    writer.flush().await.unwrap();

    // A fresh cache over the same store has nothing in memory.
    let reader = TieredCache::with_store(store);
    assert_eq!(reader.get_mem_sync("k"), None);
    assert_eq!(reader.get("k").await.unwrap(), Some(nested.clone()));
    // Promoted into memory, not queued.
    assert_eq!(reader.get_mem_sync("k"), Some(nested));
    assert_eq!(reader.pending_len(), 0);
}

#[tokio::test]
async fn tombstone_hides_durable_value_until_flushed() {
    let store = Arc::new(MemoryStore::new());
    let cache = TieredCache::with_store(store.clone());
    cache.set("k", json!("v")).await.unwrap();

    cache.set_mem_sync("k", None::<Value>);
    assert_eq!(cache.get("k").await.unwrap(), None);
    assert!(cache.is_pending_delete("k"));
    assert!(!cache.is_pending_write("k"));

    cache.set_mem_sync("k", json!("back"));
    assert!(cache.is_pending_write("k"));
    assert!(!cache.is_pending_delete("k"));

    cache.set_mem_sync("k", Value::Null);
    cache.flush().await.unwrap();
    assert!(store.get("k").await.unwrap().is_none());
    assert_eq!(cache.get("k").await.unwrap(), None);
}

#[tokio::test]
async fn flush_clears_only_what_it_snapshotted() {
    init_tracing();
    let store = Arc::new(GatedStore::new());
    let cache = Arc::new(TieredCache::with_store(store.clone()));
    cache.set_mem_sync("a", json!(1));

    let flushing = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.flush().await })
    };
    with_timeout(store.entered()).await;

    // Written while the batch is in flight: belongs to the next flush.
    cache.set_mem_sync("b", json!(2));
    store.release();
    with_timeout(flushing).await.unwrap().unwrap();

    assert!(!cache.is_pending_write("a"));
    assert!(cache.is_pending_write("b"));
    assert_eq!(store.inner().entries().keys().collect::<Vec<_>>(), vec!["a"]);
}

#[tokio::test]
async fn failed_flush_requeues_snapshot_and_surfaces_error() {
    let store = Arc::new(FailingStore::new());
    let cache = TieredCache::with_store(store.clone());
    cache.set_mem_sync("w", json!("x")).set_mem_sync("d", None::<Value>);

    store.set_failing(true);
    let err = cache.flush().await.unwrap_err();
    assert!(matches!(err, HammerpackError::Storage(_)));
    assert!(cache.is_pending_write("w"));
    assert!(cache.is_pending_delete("d"));
    assert_eq!(store.batch_calls(), 1);

    // No automatic retry; the next explicit flush succeeds.
    store.set_failing(false);
    cache.flush().await.unwrap();
    assert_eq!(cache.pending_len(), 0);
    assert_eq!(store.batch_calls(), 2);
    assert_eq!(store.inner().entries().get("w").map(String::as_str), Some("\"x\""));
}

#[tokio::test]
async fn requeue_after_failure_keeps_newer_changes() {
    let store = Arc::new(GatedStore::new());
    let cache = Arc::new(TieredCache::with_store(store.clone()));
    cache.set_mem_sync("a", json!(1)).set_mem_sync("b", json!(1));

    store.fail_next();
    let flushing = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.flush().await })
    };
    with_timeout(store.entered()).await;

    // `a` becomes a delete while its write is in flight.
    cache.set_mem_sync("a", None::<Value>);
    store.release();
    assert!(with_timeout(flushing).await.unwrap().is_err());

    assert!(cache.is_pending_delete("a"));
    assert!(!cache.is_pending_write("a"));
    assert!(cache.is_pending_write("b"));
    assert_eq!(cache.get_mem_sync("a"), None);
}

#[tokio::test]
async fn memory_write_during_durable_put_is_kept() {
    let store = Arc::new(GatedStore::new());
    store.gate_puts();
    let cache = Arc::new(TieredCache::with_store(store.clone()));

    let writing = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.set("k", json!("old")).await })
    };
    with_timeout(store.entered()).await;

    cache.set_mem_sync("k", json!("new"));
    store.release();
    with_timeout(writing).await.unwrap().unwrap();

    assert_eq!(cache.get_mem_sync("k"), Some(json!("new")));
    assert!(cache.is_pending_write("k"));

    let flushing = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.flush().await })
    };
    with_timeout(store.entered()).await;
    store.release();
    with_timeout(flushing).await.unwrap().unwrap();

    assert_eq!(store.inner().entries().get("k").map(String::as_str), Some("\"new\""));
    assert_eq!(cache.pending_len(), 0);
}

#[tokio::test]
async fn failed_durable_delete_stays_queued() {
    let store = Arc::new(FailingStore::new());
    let cache = TieredCache::with_store(store.clone());
    cache.set("k", json!(1)).await.unwrap();

    store.set_failing(true);
    assert!(cache.set("k", None::<Value>).await.is_err());
    assert!(cache.is_pending_delete("k"));
    assert_eq!(cache.get("k").await.unwrap(), None);

    store.set_failing(false);
    cache.flush().await.unwrap();
    assert!(store.inner().is_empty());
}

#[tokio::test]
async fn file_store_backs_the_cache_across_restarts() {
    let dir = tempfile::tempdir().unwrap();
    let key = FileCacheKey::new("src/a.ts", content_hash(b"export {}"));
    let value = FileCacheValue {
        transformed_text: Some("compiled".into()),
        map_text: Some("{}".into()),
        definition_text: None,
        dependencies: vec!["src/b.ts".into()],
    };

    {
        let store = FileStore::open(dir.path()).await.unwrap();
        let files = IncrementalFileCache::new(Arc::new(TieredCache::with_store(Arc::new(store))));
        files.set_file(&key, &value).unwrap();
        files.flush_writes().await.unwrap();
    }

    let store = FileStore::open(dir.path()).await.unwrap();
    let files = IncrementalFileCache::new(Arc::new(TieredCache::with_store(Arc::new(store))));
    assert_eq!(files.get_file(&key).await.unwrap(), Some(value));

    // Different contents, different hash, no stale hit.
    let changed = FileCacheKey::new("src/a.ts", content_hash(b"export const x = 1"));
    assert_eq!(files.get_file(&changed).await.unwrap(), None);
}
