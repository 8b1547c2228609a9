// src/dag/runner.rs

//! Async execution of an ordering expression.
//!
//! A [`TaskGraphRunner`] is built per attempt: register units with
//! [`TaskGraphRunner::add`], plan them with [`TaskGraphRunner::parse`], then
//! consume the runner with [`TaskGraphRunner::run`]. Each unit is spawned on
//! the tokio runtime and reports back over an mpsc channel; the pure
//! [`Scheduler`] decides what may start next.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::anyhow;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cancel::CancellationToken;
use crate::dag::expression::OrderingExpr;
use crate::dag::graph::{ExecutionPlan, TaskName};
use crate::dag::report::{RunReport, UnitOutcome};
use crate::dag::scheduler::{Scheduler, SkipReason};
use crate::errors::{HammerpackError, Result};

/// What a unit of work gets to see: its own name, the runner's label and the
/// run's cancellation token. Never the results of other units.
#[derive(Debug, Clone)]
pub struct UnitContext {
    pub task: TaskName,
    pub runner: String,
    pub cancellation: CancellationToken,
}

pub type UnitFuture = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send>>;
pub type UnitOfWork = Box<dyn FnOnce(UnitContext) -> UnitFuture + Send>;

struct Completion {
    task: TaskName,
    result: anyhow::Result<Value>,
}

pub struct TaskGraphRunner {
    name: String,
    units: HashMap<TaskName, UnitOfWork>,
    plan: ExecutionPlan,
    cancellation: CancellationToken,
}

impl fmt::Debug for TaskGraphRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut units: Vec<&str> = self.units.keys().map(String::as_str).collect();
        units.sort_unstable();
        f.debug_struct("TaskGraphRunner")
            .field("name", &self.name)
            .field("units", &units)
            .field("plan", &self.plan)
            .finish_non_exhaustive()
    }
}

impl TaskGraphRunner {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            units: HashMap::new(),
            plan: ExecutionPlan::new(),
            cancellation: CancellationToken::new(),
        }
    }

    /// Use an externally owned token instead of a fresh one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    /// Register the unit of work for `name`. Registering a name again replaces
    /// the earlier unit.
    pub fn add<F, Fut>(&mut self, name: impl Into<String>, unit: F) -> Result<&mut Self>
    where
        F: FnOnce(UnitContext) -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(HammerpackError::InvalidArgument(format!(
                "unit of work name must not be empty (runner '{}')",
                self.name
            )));
        }

        let boxed: UnitOfWork = Box::new(move |ctx| Box::pin(unit(ctx)));
        self.units.insert(name, boxed);
        Ok(self)
    }

    /// Plan `expr` against the registered units. Empty expressions are a
    /// no-op; an unregistered name fails the whole parse.
    pub fn parse(&mut self, expr: impl Into<OrderingExpr>) -> Result<&mut Self> {
        let expr = expr.into();
        if expr.is_empty() {
            return Ok(self);
        }

        let plan = ExecutionPlan::from_expression(&expr, |n| self.units.contains_key(n), true)?;
        debug!(runner = %self.name, expression = %expr, tasks = plan.len(), "parsed ordering expression");
        self.plan.merge(plan);
        Ok(self)
    }

    /// Plan `expr` without requiring registered units. Used to discover which
    /// units an expression needs before registering them.
    pub fn introspect(&self, expr: impl Into<OrderingExpr>) -> ExecutionPlan {
        let expr = expr.into();
        // Non-strict planning never fails.
        ExecutionPlan::from_expression(&expr, |n| self.units.contains_key(n), false)
            .unwrap_or_default()
    }

    /// Run the plan to completion.
    ///
    /// Configuration problems (no plan, unresolved prerequisites, cycles) are
    /// returned as `Err` before anything starts. Unit failures are reported
    /// in the returned [`RunReport`].
    pub async fn run(self) -> Result<RunReport> {
        let TaskGraphRunner {
            name,
            mut units,
            plan,
            cancellation,
        } = self;

        if plan.is_empty() {
            return Err(HammerpackError::MissingPlan(name));
        }
        plan.validate()?;

        let mut report = RunReport::new(name.clone());
        let mut scheduler = Scheduler::new(plan);
        let (tx, mut rx) = mpsc::unbounded_channel::<Completion>();
        let mut cancel_seen = false;

        info!(runner = %name, tasks = scheduler.plan().len(), "starting task graph run");

        if cancellation.is_cancellation_requested() {
            cancel_seen = true;
            skip_cancelled(&name, &mut scheduler, &mut report);
        }

        let ready = scheduler.start();
        spawn_ready(&name, ready, &mut units, &cancellation, &tx);

        while !scheduler.is_finished() {
            tokio::select! {
                biased;

                Some(done) = rx.recv() => {
                    if cancellation.is_cancellation_requested() && !cancel_seen {
                        cancel_seen = true;
                        skip_cancelled(&name, &mut scheduler, &mut report);
                    }

                    let success = done.result.is_ok();
                    let outcome = match done.result {
                        Ok(value) => {
                            debug!(runner = %name, task = %done.task, "unit of work succeeded");
                            UnitOutcome::Succeeded(value)
                        }
                        Err(err) => {
                            warn!(runner = %name, task = %done.task, error = %err, "unit of work failed");
                            UnitOutcome::Failed(err)
                        }
                    };
                    report.record(done.task.clone(), outcome);

                    let step = scheduler.step_completion(&done.task, success);
                    for (task, reason) in step.newly_skipped {
                        debug!(runner = %name, task = %task, reason = ?reason, "skipping unit of work");
                        report.record(task, UnitOutcome::Skipped(reason));
                    }
                    spawn_ready(&name, step.newly_ready, &mut units, &cancellation, &tx);
                }

                _ = cancellation.cancelled(), if !cancel_seen => {
                    cancel_seen = true;
                    skip_cancelled(&name, &mut scheduler, &mut report);
                }

                else => break,
            }
        }

        report.cancelled = cancellation.is_cancellation_requested();
        info!(
            runner = %name,
            success = report.is_success(),
            cancelled = report.cancelled,
            "task graph run finished"
        );

        Ok(report)
    }
}

fn skip_cancelled(runner: &str, scheduler: &mut Scheduler, report: &mut RunReport) {
    let skipped = scheduler.cancel_pending();
    if !skipped.is_empty() {
        info!(runner = %runner, skipped = skipped.len(), "cancellation requested; not starting remaining units");
    }
    for task in skipped {
        report.record(task, UnitOutcome::Skipped(SkipReason::Cancelled));
    }
}

fn spawn_ready(
    runner: &str,
    ready: Vec<TaskName>,
    units: &mut HashMap<TaskName, UnitOfWork>,
    cancellation: &CancellationToken,
    tx: &mpsc::UnboundedSender<Completion>,
) {
    for task in ready {
        let tx = tx.clone();

        let Some(unit) = units.remove(&task) else {
            // Parsing guarantees a unit per planned name; this only guards
            // against the same unit being started twice.
            let _ = tx.send(Completion {
                result: Err(anyhow!("no unit of work available for '{task}'")),
                task,
            });
            continue;
        };

        let ctx = UnitContext {
            task: task.clone(),
            runner: runner.to_string(),
            cancellation: cancellation.clone(),
        };

        info!(runner = %runner, task = %task, "starting unit of work");

        tokio::spawn(async move {
            // The unit runs in its own task so a panic surfaces as a JoinError
            // here instead of tearing down the run.
            let handle = tokio::spawn(async move { unit(ctx).await });
            let result = match handle.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => Err(anyhow!("unit of work '{task}' panicked")),
                Err(err) => Err(anyhow!("unit of work '{task}' was aborted: {err}")),
            };
            let _ = tx.send(Completion { task, result });
        });
    }
}
