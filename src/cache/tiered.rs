// src/cache/tiered.rs

//! Volatile map plus an optional durable tier.
//!
//! Memory operations (`get_mem_sync`, `set_mem_sync`) never suspend and queue
//! the key for the next [`TieredCache::flush`]. `get` and `set` go through to
//! the durable tier. A pending delete (tombstone) always reads as absent, and
//! a key is never queued for both a write and a delete.
//!
//! All state sits behind one `std::sync::Mutex` that is never held across an
//! `.await`. Each key carries a revision number bumped on every mutation so
//! async operations can tell whether the key changed while they were waiting.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::codec;
use crate::cache::durable::{BatchOp, DurableStore};
use crate::errors::Result;

#[derive(Debug, Default)]
struct CacheState {
    volatile: HashMap<String, Value>,
    pending_writes: BTreeSet<String>,
    pending_deletes: BTreeSet<String>,
    revisions: HashMap<String, u64>,
    next_revision: u64,
    /// Revision reported for keys with no entry in `revisions`.
    pruned_at: u64,
}

impl CacheState {
    fn bump(&mut self, key: &str) {
        self.next_revision += 1;
        self.revisions.insert(key.to_string(), self.next_revision);
    }

    fn revision(&self, key: &str) -> u64 {
        self.revisions.get(key).copied().unwrap_or(self.pruned_at)
    }

    /// Forget revisions of keys that are neither in memory nor queued.
    ///
    /// Untracked keys then report a fresh revision, so an operation that
    /// started before the prune sees its key as changed.
    fn prune_revisions(&mut self) {
        let before = self.revisions.len();
        let CacheState {
            volatile,
            pending_writes,
            pending_deletes,
            revisions,
            ..
        } = self;
        revisions.retain(|k, _| {
            volatile.contains_key(k) || pending_writes.contains(k) || pending_deletes.contains(k)
        });
        if self.revisions.len() != before {
            self.next_revision += 1;
            self.pruned_at = self.next_revision;
        }
    }

    /// What memory alone says about `key`: `Some(None)` is a tombstone,
    /// `None` means memory does not know.
    fn memory_view(&self, key: &str) -> Option<Option<Value>> {
        if self.pending_deletes.contains(key) {
            Some(None)
        } else {
            self.volatile.get(key).cloned().map(Some)
        }
    }

    fn write_mem(&mut self, key: &str, value: Value) {
        self.volatile.insert(key.to_string(), value);
        self.pending_deletes.remove(key);
        self.pending_writes.insert(key.to_string());
        self.bump(key);
    }

    fn tombstone(&mut self, key: &str) {
        self.volatile.remove(key);
        self.pending_writes.remove(key);
        self.pending_deletes.insert(key.to_string());
        self.bump(key);
    }
}

pub struct TieredCache {
    state: Mutex<CacheState>,
    durable: Option<Arc<dyn DurableStore>>,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("TieredCache")
            .field("entries", &state.volatile.len())
            .field("pending_writes", &state.pending_writes.len())
            .field("pending_deletes", &state.pending_deletes.len())
            .field("durable", &self.durable.is_some())
            .finish()
    }
}

fn is_tombstone(value: &Option<Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

impl TieredCache {
    /// A cache with no durable tier.
    pub fn volatile_only() -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            durable: None,
        }
    }

    pub fn with_store(store: Arc<dyn DurableStore>) -> Self {
        Self {
            state: Mutex::new(CacheState::default()),
            durable: Some(store),
        }
    }

    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Memory-only read. A pending delete reads as absent.
    pub fn get_mem_sync(&self, key: &str) -> Option<Value> {
        self.lock().memory_view(key).flatten()
    }

    /// Memory-only write queued for the next flush. `None` or JSON `null`
    /// queues a delete instead.
    pub fn set_mem_sync(&self, key: impl Into<String>, value: impl Into<Option<Value>>) -> &Self {
        let key = key.into();
        let value = value.into();
        let mut state = self.lock();
        match value {
            Some(v) if !v.is_null() => state.write_mem(&key, v),
            _ => state.tombstone(&key),
        }
        self
    }

    /// Read through to the durable tier on a memory miss.
    ///
    /// A durable hit is promoted into memory unless the key changed while
    /// the read was in flight, in which case the newer memory state wins.
    pub async fn get(&self, key: &str) -> Result<Option<Value>> {
        let (store, revision) = {
            let state = self.lock();
            if let Some(known) = state.memory_view(key) {
                return Ok(known);
            }
            match &self.durable {
                Some(store) => (Arc::clone(store), state.revision(key)),
                None => return Ok(None),
            }
        };

        let Some(text) = store.get(key).await? else {
            return Ok(None);
        };

        let value = match codec::decode(&text) {
            Ok(v) => v,
            Err(e) => {
                warn!(key = %key, error = %e, "undecodable durable entry; treating as miss");
                return Ok(None);
            }
        };

        let mut state = self.lock();
        if state.revision(key) != revision {
            debug!(key = %key, "key changed during durable read; keeping memory state");
            return Ok(state.memory_view(key).unwrap_or(Some(value)));
        }

        state.volatile.insert(key.to_string(), value.clone());
        state.pending_writes.remove(key);
        state.pending_deletes.remove(key);
        Ok(Some(value))
    }

    /// Write (or delete, for `None` / `null`) through to the durable tier,
    /// then update memory once the store confirmed.
    ///
    /// A delete is visible as a tombstone immediately. If the durable delete
    /// fails the tombstone stays queued so the next flush retries it.
    pub async fn set(&self, key: &str, value: impl Into<Option<Value>>) -> Result<()> {
        let value = value.into();

        if is_tombstone(&value) {
            let revision = {
                let mut state = self.lock();
                state.tombstone(key);
                state.revision(key)
            };

            if let Some(store) = &self.durable {
                store.del(key).await?;
            }

            let mut state = self.lock();
            if state.revision(key) == revision {
                state.pending_deletes.remove(key);
            }
            return Ok(());
        }

        let value = value.unwrap_or(Value::Null);
        let revision = self.lock().revision(key);
        if let Some(store) = &self.durable {
            store.put(key, codec::encode(&value)?).await?;
        }

        let mut state = self.lock();
        if state.revision(key) != revision {
            debug!(key = %key, "key changed during durable write; keeping memory state");
            return Ok(());
        }
        state.volatile.insert(key.to_string(), value);
        state.pending_writes.remove(key);
        state.pending_deletes.remove(key);
        state.bump(key);
        Ok(())
    }

    /// Push every queued write and delete to the durable tier in one batch.
    ///
    /// The queue is snapshotted and cleared before the batch is submitted so
    /// memory writes made meanwhile are queued for the next flush. On failure
    /// the snapshot is merged back, skipping keys that changed since.
    pub async fn flush(&self) -> Result<()> {
        let (store, ops, snapshot) = {
            let mut state = self.lock();

            let Some(store) = &self.durable else {
                let dropped = state.pending_writes.len() + state.pending_deletes.len();
                if dropped > 0 {
                    debug!(dropped, "no durable tier; dropping flush queue");
                }
                state.pending_writes.clear();
                state.pending_deletes.clear();
                return Ok(());
            };

            let mut ops = Vec::with_capacity(state.pending_writes.len() + state.pending_deletes.len());
            for key in &state.pending_writes {
                match state.volatile.get(key) {
                    Some(value) => ops.push(BatchOp::Put {
                        key: key.clone(),
                        value: codec::encode(value)?,
                    }),
                    None => {
                        warn!(key = %key, "queued write has no value in memory; skipping");
                    }
                }
            }
            for key in &state.pending_deletes {
                ops.push(BatchOp::Del { key: key.clone() });
            }

            let writes = std::mem::take(&mut state.pending_writes);
            let deletes = std::mem::take(&mut state.pending_deletes);
            let snapshot: Vec<(String, bool, u64)> = writes
                .into_iter()
                .map(|k| (k, true))
                .chain(deletes.into_iter().map(|k| (k, false)))
                .map(|(k, is_write)| {
                    let rev = state.revision(&k);
                    (k, is_write, rev)
                })
                .collect();

            (Arc::clone(store), ops, snapshot)
        };

        if ops.is_empty() {
            return Ok(());
        }

        let count = ops.len();
        match store.batch(ops).await {
            Ok(()) => {
                debug!(ops = count, "flushed cache to durable tier");
                Ok(())
            }
            Err(err) => {
                let mut state = self.lock();
                for (key, is_write, revision) in snapshot {
                    if state.revision(&key) != revision {
                        continue;
                    }
                    if is_write {
                        state.pending_writes.insert(key);
                    } else {
                        state.pending_deletes.insert(key);
                    }
                }
                warn!(ops = count, error = %err, "flush failed; re-queued pending keys");
                Err(err)
            }
        }
    }

    /// Forget every queued write and delete without touching memory.
    pub fn clear_flush_queue(&self) {
        let mut state = self.lock();
        state.pending_writes.clear();
        state.pending_deletes.clear();
        state.prune_revisions();
    }

    /// Drop every in-memory value. Queued keys stay queued.
    pub fn clear_mem(&self) {
        let mut state = self.lock();
        state.volatile.clear();
        state.prune_revisions();
    }

    pub fn is_pending_write(&self, key: &str) -> bool {
        self.lock().pending_writes.contains(key)
    }

    pub fn is_pending_delete(&self, key: &str) -> bool {
        self.lock().pending_deletes.contains(key)
    }

    /// Number of queued writes plus queued deletes.
    pub fn pending_len(&self) -> usize {
        let state = self.lock();
        state.pending_writes.len() + state.pending_deletes.len()
    }
}
