// src/cache/mod.rs

//! Two-tier caching.
//!
//! - [`tiered`] is the volatile map with queued, batched flushes to a
//!   [`DurableStore`].
//! - [`durable`] defines the store trait and an in-memory store;
//!   [`file_store`] persists to disk.
//! - [`file_cache`] layers content-addressed per-file entries on top, keyed
//!   by the helpers in [`keys`] and the digests in [`hash`].

pub mod codec;
pub mod durable;
pub mod file_cache;
pub mod file_store;
pub mod hash;
pub mod keys;
pub mod tiered;

pub use durable::{BatchOp, DurableStore, MemoryStore, StoreFuture};
pub use file_cache::{FileCacheValue, IncrementalFileCache};
pub use file_store::FileStore;
pub use hash::{compute_file_hash, content_hash};
pub use keys::{
    AsCacheKey, FileCacheKey, PluginCacheKey, compose_file_key, compose_plugin_key,
    decompose_file_key, decompose_plugin_key,
};
pub use tiered::TieredCache;
