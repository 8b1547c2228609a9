// src/watch/watcher.rs

use std::path::PathBuf;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::DevelopEvent;
use crate::errors::{HammerpackError, Result};
use crate::watch::patterns::{PathFilter, relative_path};
use crate::watch::{WatchEvent, classify};

/// Keeps the underlying watcher alive; dropping it stops watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and post every change that passes `filter` to
/// the develop loop as [`DevelopEvent::FilesChanged`].
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    filter: PathFilter,
    tx: mpsc::Sender<DevelopEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or(root);

    // notify calls back on its own thread.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();
    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| {
            let _ = event_tx.send(res);
        },
        Config::default(),
    )
    .map_err(|e| HammerpackError::Other(e.into()))?;

    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| HammerpackError::Other(e.into()))?;
    info!(root = %root.display(), "file watcher started");

    tokio::spawn(async move {
        while let Some(res) = event_rx.recv().await {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    warn!(error = %e, "file watch error");
                    continue;
                }
            };

            let changes: Vec<WatchEvent> = event
                .paths
                .iter()
                .filter(|path| {
                    relative_path(&root, path).is_some_and(|rel| !rel.is_empty() && filter.matches(&rel))
                })
                .filter_map(|path| classify(&event.kind, path).map(|kind| WatchEvent::new(kind, path)))
                .collect();

            if changes.is_empty() {
                continue;
            }

            debug!(count = changes.len(), "forwarding file changes");
            if tx.send(DevelopEvent::FilesChanged(changes)).await.is_err() {
                debug!("develop loop closed; stopping watcher task");
                break;
            }
        }
    });

    Ok(WatcherHandle { _inner: watcher })
}
