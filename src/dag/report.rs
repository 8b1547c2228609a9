// src/dag/report.rs

//! The outcome of one [`TaskGraphRunner`](crate::dag::TaskGraphRunner) run.

use std::collections::BTreeMap;

use anyhow::anyhow;
use serde_json::Value;

use crate::dag::graph::TaskName;
use crate::dag::scheduler::SkipReason;
use crate::errors::HammerpackError;

#[derive(Debug)]
pub enum UnitOutcome {
    Succeeded(Value),
    Failed(anyhow::Error),
    Skipped(SkipReason),
}

/// Every planned task's outcome plus the first failure, if any.
#[derive(Debug)]
pub struct RunReport {
    pub runner: String,
    pub outcomes: BTreeMap<TaskName, UnitOutcome>,
    /// The first unit whose failure was observed.
    pub first_failure: Option<TaskName>,
    /// Whether cancellation was requested while the run was in progress.
    pub cancelled: bool,
}

impl RunReport {
    pub fn new(runner: impl Into<String>) -> Self {
        Self {
            runner: runner.into(),
            outcomes: BTreeMap::new(),
            first_failure: None,
            cancelled: false,
        }
    }

    pub(crate) fn record(&mut self, task: TaskName, outcome: UnitOutcome) {
        if matches!(outcome, UnitOutcome::Failed(_)) && self.first_failure.is_none() {
            self.first_failure = Some(task.clone());
        }
        self.outcomes.insert(task, outcome);
    }

    /// No failures, no skips, no cancellation.
    pub fn is_success(&self) -> bool {
        !self.cancelled
            && self
                .outcomes
                .values()
                .all(|o| matches!(o, UnitOutcome::Succeeded(_)))
    }

    pub fn outcome(&self, task: &str) -> Option<&UnitOutcome> {
        self.outcomes.get(task)
    }

    /// The error of the first failed unit.
    pub fn first_error(&self) -> Option<&anyhow::Error> {
        let task = self.first_failure.as_ref()?;
        match self.outcomes.get(task) {
            Some(UnitOutcome::Failed(err)) => Some(err),
            _ => None,
        }
    }

    /// Values of the units that succeeded.
    pub fn results(&self) -> BTreeMap<&str, &Value> {
        self.outcomes
            .iter()
            .filter_map(|(task, o)| match o {
                UnitOutcome::Succeeded(v) => Some((task.as_str(), v)),
                _ => None,
            })
            .collect()
    }

    pub fn skipped(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, UnitOutcome::Skipped(_)))
            .map(|(task, _)| task.as_str())
            .collect()
    }

    /// Collapse the report into the successful results or the first error.
    ///
    /// A failed unit wins over cancellation, so a run that was cancelled
    /// because something broke reports what broke.
    pub fn into_result(mut self) -> anyhow::Result<BTreeMap<TaskName, Value>> {
        if let Some(task) = self.first_failure.take() {
            let err = match self.outcomes.remove(&task) {
                Some(UnitOutcome::Failed(err)) => err,
                _ => anyhow!("unit of work failed"),
            };
            return Err(err.context(format!("'{task}' failed in {}", self.runner)));
        }

        if self.cancelled {
            return Err(HammerpackError::Cancelled.into());
        }

        Ok(self
            .outcomes
            .into_iter()
            .filter_map(|(task, o)| match o {
                UnitOutcome::Succeeded(v) => Some((task, v)),
                _ => None,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn first_failure_is_sticky() {
        let mut report = RunReport::new("build");
        report.record("a".into(), UnitOutcome::Succeeded(json!(1)));
        report.record("b".into(), UnitOutcome::Failed(anyhow!("boom")));
        report.record("c".into(), UnitOutcome::Failed(anyhow!("later")));

        assert_eq!(report.first_failure.as_deref(), Some("b"));
        assert_eq!(report.first_error().unwrap().to_string(), "boom");
        assert!(!report.is_success());
        assert_eq!(report.results().len(), 1);
    }

    #[test]
    fn into_result_carries_task_name() {
        let mut report = RunReport::new("build");
        report.record("compile".into(), UnitOutcome::Failed(anyhow!("syntax error")));

        let err = report.into_result().unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("'compile' failed in build"));
        assert!(chain.contains("syntax error"));
    }

    #[test]
    fn cancelled_run_without_failure_is_cancelled() {
        let mut report = RunReport::new("develop");
        report.record("a".into(), UnitOutcome::Succeeded(Value::Null));
        report.record("b".into(), UnitOutcome::Skipped(SkipReason::Cancelled));
        report.cancelled = true;

        assert_eq!(report.skipped(), vec!["b"]);
        let err = report.into_result().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<HammerpackError>(),
            Some(HammerpackError::Cancelled)
        ));
    }
}
