// src/engine/runtime.rs

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cancel::CancellationToken;
use crate::engine::core::DevelopCore;
use crate::engine::{DevelopCommand, DevelopEvent, DevelopStep, RunId};
use crate::errors::Result;
use crate::watch::WatchEvent;

/// Resolves to whether the run succeeded.
pub type RunFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Starts one develop run. The shell owns the token and cancels it when the
/// core asks.
pub trait RunLauncher: Send + Sync + 'static {
    fn launch(&self, run_id: RunId, changes: Vec<WatchEvent>, token: CancellationToken) -> RunFuture;
}

/// Async shell around [`DevelopCore`].
pub struct DevelopRuntime<L: RunLauncher> {
    core: DevelopCore,
    event_rx: mpsc::Receiver<DevelopEvent>,
    event_tx: mpsc::Sender<DevelopEvent>,
    launcher: Arc<L>,
    active: Option<(RunId, CancellationToken)>,
    debounce: Duration,
}

impl<L: RunLauncher> fmt::Debug for DevelopRuntime<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevelopRuntime")
            .field("core", &self.core)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl<L: RunLauncher> DevelopRuntime<L> {
    /// `event_tx` must feed `event_rx`; run completions are posted on it.
    pub fn new(
        event_rx: mpsc::Receiver<DevelopEvent>,
        event_tx: mpsc::Sender<DevelopEvent>,
        launcher: L,
    ) -> Self {
        Self {
            core: DevelopCore::new(),
            event_rx,
            event_tx,
            launcher: Arc::new(launcher),
            active: None,
            debounce: Duration::from_millis(50),
        }
    }

    /// Quiet period used to gather a burst of file events into one change set.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Run until shutdown is requested and the in-flight run has ended.
    pub async fn run(mut self) -> Result<()> {
        info!("develop loop started");

        let step = self.core.start();
        if !self.apply(step) {
            return Ok(());
        }

        while let Some(event) = self.event_rx.recv().await {
            let mut deferred = None;
            let event = match event {
                DevelopEvent::FilesChanged(mut changes) => {
                    deferred = self.gather_burst(&mut changes).await;
                    DevelopEvent::FilesChanged(changes)
                }
                other => other,
            };

            debug!(?event, "develop loop received event");
            let step = self.core.step(event);
            if !self.apply(step) {
                break;
            }

            if let Some(event) = deferred {
                let step = self.core.step(event);
                if !self.apply(step) {
                    break;
                }
            }
        }

        info!("develop loop exiting");
        Ok(())
    }

    /// Pull further file events until the channel is quiet for the debounce
    /// window. A non-file event ends the burst and is handed back.
    async fn gather_burst(&mut self, changes: &mut Vec<WatchEvent>) -> Option<DevelopEvent> {
        if self.debounce.is_zero() {
            return None;
        }
        loop {
            match tokio::time::timeout(self.debounce, self.event_rx.recv()).await {
                Ok(Some(DevelopEvent::FilesChanged(more))) => changes.extend(more),
                Ok(Some(other)) => return Some(other),
                Ok(None) | Err(_) => return None,
            }
        }
    }

    /// Carry out the core's commands; `false` once it asked to exit.
    fn apply(&mut self, step: DevelopStep) -> bool {
        for command in step.commands {
            match command {
                DevelopCommand::StartRun { run_id, changes } => self.spawn_run(run_id, changes),
                DevelopCommand::CancelRun { run_id } => match &self.active {
                    Some((active, token)) if *active == run_id => {
                        info!(run_id, "cancelling current run");
                        token.cancel();
                    }
                    _ => debug!(run_id, "cancel for a run that is no longer active"),
                },
                DevelopCommand::Exit => info!("shutdown complete"),
            }
        }
        step.keep_running
    }

    fn spawn_run(&mut self, run_id: RunId, changes: Vec<WatchEvent>) {
        info!(run_id, changes = changes.len(), "starting develop run");
        let token = CancellationToken::new();
        self.active = Some((run_id, token.clone()));

        let fut = self.launcher.launch(run_id, changes, token);
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let success = match tokio::spawn(fut).await {
                Ok(success) => success,
                Err(e) => {
                    error!(run_id, error = %e, "develop run panicked");
                    false
                }
            };
            let _ = tx.send(DevelopEvent::RunFinished { run_id, success }).await;
        });
    }
}
