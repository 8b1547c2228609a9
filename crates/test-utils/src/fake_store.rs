use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use hammerpack::cache::{BatchOp, DurableStore, MemoryStore, StoreFuture};
use hammerpack::errors::HammerpackError;
use tokio::sync::Notify;

/// A [`MemoryStore`] whose writes can be switched to fail.
#[derive(Debug, Default)]
pub struct FailingStore {
    inner: MemoryStore,
    fail_writes: AtomicBool,
    batches: AtomicUsize,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Number of batch calls, failed ones included.
    pub fn batch_calls(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn check(&self) -> hammerpack::errors::Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(HammerpackError::Storage("injected write failure".into()))
        } else {
            Ok(())
        }
    }
}

impl DurableStore for FailingStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        self.inner.get(key)
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.put(key, value).await
        })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            self.check()?;
            self.inner.del(key).await
        })
    }

    fn batch(&self, ops: Vec<BatchOp>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.batches.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.batch(ops).await
        })
    }
}

/// A [`MemoryStore`] whose batches block until released, so tests can act
/// while a flush is in flight. Puts block too after [`GatedStore::gate_puts`].
#[derive(Debug, Default)]
pub struct GatedStore {
    inner: MemoryStore,
    entered: Arc<Notify>,
    release: Arc<Notify>,
    fail_next: AtomicBool,
    gate_puts: AtomicBool,
}

impl GatedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &MemoryStore {
        &self.inner
    }

    /// Resolves once a batch is waiting at the gate.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the waiting batch continue.
    pub fn release(&self) {
        self.release.notify_one();
    }

    /// Make the next gated batch fail after release.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Hold single-key puts at the gate as well.
    pub fn gate_puts(&self) {
        self.gate_puts.store(true, Ordering::SeqCst);
    }
}

impl DurableStore for GatedStore {
    fn get<'a>(&'a self, key: &'a str) -> StoreFuture<'a, Option<String>> {
        self.inner.get(key)
    }

    fn put<'a>(&'a self, key: &'a str, value: String) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            if self.gate_puts.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
            self.inner.put(key, value).await
        })
    }

    fn del<'a>(&'a self, key: &'a str) -> StoreFuture<'a, ()> {
        self.inner.del(key)
    }

    fn batch(&self, ops: Vec<BatchOp>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            self.entered.notify_one();
            self.release.notified().await;
            if self.fail_next.swap(false, Ordering::SeqCst) {
                return Err(HammerpackError::Storage("injected batch failure".into()));
            }
            self.inner.batch(ops).await
        })
    }
}
