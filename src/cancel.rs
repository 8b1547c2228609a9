// src/cancel.rs

//! Cooperative cancellation.
//!
//! A [`CancellationToken`] is a shared flag that long-running work checks at
//! its own boundaries (between files, between units of work). Raising it never
//! interrupts anything by force: already-dispatched work finishes on its own,
//! and loops simply stop at the next check.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

use crate::errors::{HammerpackError, Result};

#[derive(Debug, Default)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

/// Cloneable handle to a cancellation flag. All clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        if !self.inner.requested.swap(true, Ordering::SeqCst) {
            self.inner.notify.notify_waiters();
        }
    }

    pub fn is_cancellation_requested(&self) -> bool {
        self.inner.requested.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancellation_requested() {
            Err(HammerpackError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolve once cancellation has been requested.
    pub async fn cancelled(&self) {
        loop {
            // Register interest before checking the flag so a concurrent
            // `cancel()` cannot slip between the check and the wait.
            let notified = self.inner.notify.notified();
            if self.is_cancellation_requested() {
                return;
            }
            notified.await;
        }
    }
}
