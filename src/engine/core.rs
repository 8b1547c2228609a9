// src/engine/core.rs

//! Pure develop-loop state machine.
//!
//! At most one run is in flight. Changes that arrive while it runs cancel it
//! once and schedule exactly one follow-up run carrying every change seen in
//! the meantime. No tokio, channels or processes in here.

use tracing::debug;

use crate::engine::{DevelopCommand, DevelopEvent, DevelopStep, RunId};
use crate::watch::WatchEvent;

#[derive(Debug, Default)]
pub struct DevelopCore {
    next_run_id: RunId,
    running: Option<RunId>,
    cancel_sent: bool,
    run_again: bool,
    pending_changes: Vec<WatchEvent>,
    shutting_down: bool,
}

impl DevelopCore {
    pub fn new() -> Self {
        Self {
            next_run_id: 1,
            ..Self::default()
        }
    }

    pub fn running(&self) -> Option<RunId> {
        self.running
    }

    pub fn is_rerun_pending(&self) -> bool {
        self.run_again
    }

    /// Kick off the first run.
    pub fn start(&mut self) -> DevelopStep {
        let mut commands = Vec::new();
        if self.running.is_none() && !self.shutting_down {
            commands.push(self.start_run());
        }
        DevelopStep {
            commands,
            keep_running: true,
        }
    }

    pub fn step(&mut self, event: DevelopEvent) -> DevelopStep {
        match event {
            DevelopEvent::FilesChanged(changes) => self.on_files_changed(changes),
            DevelopEvent::RunFinished { run_id, success } => self.on_run_finished(run_id, success),
            DevelopEvent::ShutdownRequested => self.on_shutdown(),
        }
    }

    fn on_files_changed(&mut self, changes: Vec<WatchEvent>) -> DevelopStep {
        let mut commands = Vec::new();
        if self.shutting_down || changes.is_empty() {
            return DevelopStep {
                commands,
                keep_running: true,
            };
        }

        for change in changes {
            if !self.pending_changes.contains(&change) {
                self.pending_changes.push(change);
            }
        }

        match self.running {
            Some(run_id) => {
                self.run_again = true;
                if !self.cancel_sent {
                    self.cancel_sent = true;
                    commands.push(DevelopCommand::CancelRun { run_id });
                }
            }
            None => commands.push(self.start_run()),
        }

        DevelopStep {
            commands,
            keep_running: true,
        }
    }

    fn on_run_finished(&mut self, run_id: RunId, success: bool) -> DevelopStep {
        let mut commands = Vec::new();
        if self.running != Some(run_id) {
            debug!(run_id, "ignoring completion of a stale run");
            return DevelopStep {
                commands,
                keep_running: true,
            };
        }

        debug!(run_id, success, "run finished");
        self.running = None;
        self.cancel_sent = false;

        if self.shutting_down {
            commands.push(DevelopCommand::Exit);
            return DevelopStep {
                commands,
                keep_running: false,
            };
        }

        if self.run_again {
            self.run_again = false;
            commands.push(self.start_run());
        }

        DevelopStep {
            commands,
            keep_running: true,
        }
    }

    fn on_shutdown(&mut self) -> DevelopStep {
        let mut commands = Vec::new();
        self.shutting_down = true;
        self.run_again = false;
        self.pending_changes.clear();

        match self.running {
            Some(run_id) => {
                if !self.cancel_sent {
                    self.cancel_sent = true;
                    commands.push(DevelopCommand::CancelRun { run_id });
                }
                DevelopStep {
                    commands,
                    keep_running: true,
                }
            }
            None => {
                commands.push(DevelopCommand::Exit);
                DevelopStep {
                    commands,
                    keep_running: false,
                }
            }
        }
    }

    fn start_run(&mut self) -> DevelopCommand {
        let run_id = self.next_run_id;
        self.next_run_id += 1;
        self.running = Some(run_id);
        self.cancel_sent = false;
        DevelopCommand::StartRun {
            run_id,
            changes: std::mem::take(&mut self.pending_changes),
        }
    }
}
