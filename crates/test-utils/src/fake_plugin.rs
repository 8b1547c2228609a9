use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use hammerpack::errors::HammerpackError;
use hammerpack::plugin::{PluginContext, PluginFuture, TaskPlugin};
use serde_json::json;

/// Shared record of plugin starts and ends, plus peak concurrency.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
    running: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn position(&self, event: &str) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }

    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn enter(&self, name: &str) {
        self.push(format!("start:{name}"));
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self, name: &str) {
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.push(format!("end:{name}"));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behaviour {
    Succeed,
    Fail,
    /// Block until the run is cancelled.
    WaitForCancel,
}

/// A plugin that records when it runs, sleeps, then succeeds or fails.
#[derive(Debug, Clone)]
pub struct RecordingPlugin {
    name: String,
    log: EventLog,
    delay: Duration,
    behaviour: Behaviour,
    calls: Arc<AtomicUsize>,
}

impl RecordingPlugin {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            delay: Duration::ZERO,
            behaviour: Behaviour::Succeed,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing(mut self) -> Self {
        self.behaviour = Behaviour::Fail;
        self
    }

    pub fn wait_for_cancel(mut self) -> Self {
        self.behaviour = Behaviour::WaitForCancel;
        self
    }

    pub fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl TaskPlugin for RecordingPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: PluginContext) -> PluginFuture<'_> {
        Box::pin(async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.log.enter(&self.name);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let result = match self.behaviour {
                Behaviour::Succeed => Ok(json!({ "plugin": self.name, "changes": ctx.changes.len() })),
                Behaviour::Fail => Err(anyhow!("{} failed on purpose", self.name)),
                Behaviour::WaitForCancel => {
                    ctx.cancellation.cancelled().await;
                    Err(HammerpackError::Cancelled.into())
                }
            };

            self.log.leave(&self.name);
            result
        })
    }
}
