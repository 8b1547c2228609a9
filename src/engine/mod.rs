// src/engine/mod.rs

//! Develop mode: run a task, watch the project, run it again on change.
//!
//! The pure state machine lives in [`core`]; the async shell that owns the
//! channel, the timers and the spawned runs is in [`runtime`].

pub mod core;
pub mod launcher;
pub mod runtime;

use crate::watch::WatchEvent;

/// Identifies one attempt of the develop task.
pub type RunId = u64;

/// Events flowing into the develop loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevelopEvent {
    /// The watcher saw these changes.
    FilesChanged(Vec<WatchEvent>),
    /// A run ended, successfully or not.
    RunFinished { run_id: RunId, success: bool },
    /// Ctrl-C or an equivalent request to stop.
    ShutdownRequested,
}

/// What the shell should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DevelopCommand {
    StartRun {
        run_id: RunId,
        changes: Vec<WatchEvent>,
    },
    CancelRun { run_id: RunId },
    Exit,
}

/// Result of feeding one event to [`DevelopCore`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DevelopStep {
    pub commands: Vec<DevelopCommand>,
    pub keep_running: bool,
}

pub use core::DevelopCore;
pub use launcher::JobLauncher;
pub use runtime::{DevelopRuntime, RunFuture, RunLauncher};
