// src/dag/scheduler.rs

//! Per-run state machine over an [`ExecutionPlan`].
//!
//! The scheduler never runs anything. It decides which tasks are ready, marks
//! them running, and walks dependents when a task fails. The async runner
//! feeds completions back in and spawns whatever comes out.

use std::collections::BTreeMap;

use tracing::debug;

use crate::dag::graph::{ExecutionPlan, TaskName};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// A (transitive) prerequisite failed; carries the failed task's name.
    UpstreamFailed(TaskName),
    /// Cancellation was requested before the task could start.
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Skipped(SkipReason),
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunState::Pending | RunState::Running)
    }
}

/// Structured result of a single scheduler step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStep {
    /// Tasks that became ready and are now marked running.
    pub newly_ready: Vec<TaskName>,
    /// Tasks that were skipped in this step, with the reason.
    pub newly_skipped: Vec<(TaskName, SkipReason)>,
    /// Whether every task is now terminal.
    pub finished: bool,
}

#[derive(Debug)]
pub struct Scheduler {
    plan: ExecutionPlan,
    states: BTreeMap<TaskName, RunState>,
}

impl Scheduler {
    pub fn new(plan: ExecutionPlan) -> Self {
        let states = plan
            .task_names()
            .map(|name| (name.to_string(), RunState::Pending))
            .collect();
        Self { plan, states }
    }

    pub fn plan(&self) -> &ExecutionPlan {
        &self.plan
    }

    pub fn state_of(&self, task: &str) -> Option<&RunState> {
        self.states.get(task)
    }

    pub fn is_finished(&self) -> bool {
        self.states.values().all(RunState::is_terminal)
    }

    pub fn running_count(&self) -> usize {
        self.states
            .values()
            .filter(|s| matches!(s, RunState::Running))
            .count()
    }

    /// Mark the tasks with no unmet prerequisites as running and return them.
    pub fn start(&mut self) -> Vec<TaskName> {
        self.collect_new_ready_tasks()
    }

    /// Record the outcome of a running task.
    pub fn step_completion(&mut self, task: &str, success: bool) -> SchedulerStep {
        let mut step = SchedulerStep::default();

        match self.states.get_mut(task) {
            Some(state @ RunState::Running) => {
                if success {
                    *state = RunState::Succeeded;
                    debug!(task = %task, "task succeeded");
                    step.newly_ready = self.collect_new_ready_tasks();
                } else {
                    *state = RunState::Failed;
                    debug!(task = %task, "task failed; skipping dependents");
                    step.newly_skipped = self.mark_dependents_skipped(task);
                }
            }
            Some(other) => {
                debug!(task = %task, state = ?other, "completion for task that is not running; ignoring");
            }
            None => {
                debug!(task = %task, "completion for unknown task; ignoring");
            }
        }

        step.finished = self.is_finished();
        step
    }

    /// Skip every task that has not started yet.
    pub fn cancel_pending(&mut self) -> Vec<TaskName> {
        let mut skipped = Vec::new();
        for (name, state) in self.states.iter_mut() {
            if matches!(state, RunState::Pending) {
                *state = RunState::Skipped(SkipReason::Cancelled);
                skipped.push(name.clone());
            }
        }
        skipped
    }

    fn deps_satisfied(&self, task: &str) -> bool {
        self.plan
            .dependencies_of(task)
            .iter()
            .all(|dep| matches!(self.states.get(dep), Some(RunState::Succeeded)))
    }

    fn collect_new_ready_tasks(&mut self) -> Vec<TaskName> {
        // Decide first, then mutate.
        let ready: Vec<TaskName> = self
            .states
            .iter()
            .filter(|(name, state)| matches!(state, RunState::Pending) && self.deps_satisfied(name))
            .map(|(name, _)| name.clone())
            .collect();

        for name in &ready {
            if let Some(state) = self.states.get_mut(name) {
                *state = RunState::Running;
            }
        }

        ready
    }

    fn mark_dependents_skipped(&mut self, failed: &str) -> Vec<(TaskName, SkipReason)> {
        let mut stack: Vec<TaskName> = self
            .plan
            .dependents_of(failed)
            .into_iter()
            .map(str::to_string)
            .collect();
        let mut skipped = Vec::new();

        while let Some(name) = stack.pop() {
            if let Some(state) = self.states.get_mut(&name) {
                if matches!(state, RunState::Pending) {
                    let reason = SkipReason::UpstreamFailed(failed.to_string());
                    *state = RunState::Skipped(reason.clone());
                    skipped.push((name.clone(), reason));
                    stack.extend(self.plan.dependents_of(&name).into_iter().map(str::to_string));
                }
            }
        }

        skipped
    }
}
