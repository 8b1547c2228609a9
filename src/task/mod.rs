// src/task/mod.rs

//! A top-level task (`build`, `develop`, ...) and the job that runs it.

pub mod job;

use std::sync::Arc;

use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::dag::{ExecutionPlan, OrderingExpr, RunReport, TaskGraphRunner};
use crate::errors::{HammerpackError, Result};
use crate::plugin::{PluginContext, TaskPlugin};
use crate::types::TaskType;
use crate::watch::WatchEvent;

pub use job::Job;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    task_type: TaskType,
    steps: OrderingExpr,
}

impl Task {
    pub fn new(task_type: TaskType, steps: impl Into<OrderingExpr>) -> Self {
        Self {
            task_type,
            steps: steps.into(),
        }
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type
    }

    pub fn steps(&self) -> &OrderingExpr {
        &self.steps
    }

    /// The plan this task would run, without registering anything.
    pub fn plan(&self, job: &Job) -> ExecutionPlan {
        TaskGraphRunner::new(self.runner_name(job)).introspect(self.steps.clone())
    }

    fn runner_name(&self, job: &Job) -> String {
        format!("{}:{}", job.name(), self.task_type)
    }

    /// Run every plugin the ordering expression names.
    ///
    /// The cache is flushed after the run whatever its outcome. A flush error
    /// is returned only when the run itself succeeded.
    pub async fn execute(
        &self,
        job: &Job,
        token: CancellationToken,
        changes: Vec<WatchEvent>,
    ) -> Result<RunReport> {
        let mut runner =
            TaskGraphRunner::new(self.runner_name(job)).with_cancellation(token);

        let plan = runner.introspect(self.steps.clone());
        let plugins: Vec<Arc<dyn TaskPlugin>> = plan
            .task_names()
            .filter_map(|name| job.registry().get(name))
            .collect();
        if plugins.is_empty() {
            return Err(HammerpackError::ConfigError(format!(
                "There are no plugins to execute for {}",
                self.task_type
            )));
        }

        for plugin in plugins {
            let task_type = self.task_type;
            let root = job.root().to_path_buf();
            let cache = job.cache().clone();
            let files = job.files();
            let changes = changes.clone();
            let name = plugin.name().to_string();

            runner.add(name, move |unit| async move {
                let ctx = PluginContext {
                    plugin: unit.task,
                    task_type,
                    root,
                    cache,
                    files,
                    cancellation: unit.cancellation,
                    changes,
                };
                plugin.execute(ctx).await
            })?;
        }

        runner.parse(self.steps.clone())?;
        info!(task = %self.task_type, expression = %self.steps, "running task");

        let report = runner.run().await;
        let flushed = job.cache().flush().await;

        match (report, flushed) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(report), Err(e)) if report.is_success() => Err(e),
            (Ok(report), Err(e)) => {
                warn!(task = %self.task_type, error = %e, "cache flush failed after a failed run");
                Ok(report)
            }
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(flush_err)) => {
                warn!(task = %self.task_type, error = %flush_err, "cache flush failed");
                Err(e)
            }
        }
    }
}
