// src/engine/launcher.rs

use std::sync::Arc;

use tracing::{error, info};

use crate::cancel::CancellationToken;
use crate::engine::runtime::{RunFuture, RunLauncher};
use crate::engine::RunId;
use crate::task::Job;
use crate::types::TaskType;
use crate::watch::WatchEvent;

/// Runs one task of a [`Job`] per develop cycle.
#[derive(Debug, Clone)]
pub struct JobLauncher {
    job: Arc<Job>,
    task_type: TaskType,
}

impl JobLauncher {
    pub fn new(job: Arc<Job>, task_type: TaskType) -> Self {
        Self { job, task_type }
    }
}

impl RunLauncher for JobLauncher {
    fn launch(&self, run_id: RunId, changes: Vec<WatchEvent>, token: CancellationToken) -> RunFuture {
        let job = self.job.clone();
        let task_type = self.task_type;
        Box::pin(async move {
            let report = match job.execute(task_type, token.clone(), changes).await {
                Ok(report) => report,
                Err(e) => {
                    error!(run_id, task = %task_type, error = %e, "develop run could not start");
                    return false;
                }
            };

            let cancelled = token.is_cancellation_requested();
            match report.into_result() {
                Ok(results) => {
                    info!(run_id, task = %task_type, plugins = results.len(), "develop run succeeded");
                    true
                }
                Err(_) if cancelled => {
                    info!(run_id, task = %task_type, "develop run cancelled");
                    false
                }
                Err(e) => {
                    error!(run_id, task = %task_type, error = %format!("{e:#}"), "develop run failed");
                    false
                }
            }
        })
    }
}
