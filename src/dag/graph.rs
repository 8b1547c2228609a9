// src/dag/graph.rs

use std::collections::BTreeMap;
use std::fmt;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::dag::expression::OrderingExpr;
use crate::errors::{HammerpackError, Result};

pub type TaskName = String;

/// One planned task: the names that must complete before it may start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    /// Every name of the previous series group.
    pub deps: Vec<TaskName>,
    /// Whether a unit of work was registered for this name when planned.
    pub has_unit: bool,
}

/// Task name -> prerequisites, built from one or more ordering expressions.
///
/// Planning the same name twice replaces its earlier entry, so `"a,a"` makes
/// `a` depend on itself. [`ExecutionPlan::validate`] reports that as a cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionPlan {
    entries: BTreeMap<TaskName, PlanEntry>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a plan from `expr`.
    ///
    /// With `strict`, every name must satisfy `is_registered` or the whole
    /// build fails with [`HammerpackError::UnresolvedTask`]. Without it (dry
    /// mode), unregistered names are planned with `has_unit == false`.
    pub fn from_expression<F>(expr: &OrderingExpr, is_registered: F, strict: bool) -> Result<Self>
    where
        F: Fn(&str) -> bool,
    {
        let mut entries = BTreeMap::new();
        let mut previous: Vec<TaskName> = Vec::new();

        for group in expr.groups() {
            let mut next: Vec<TaskName> = Vec::with_capacity(group.len());

            for task in group {
                let has_unit = is_registered(&task);
                if !has_unit && strict {
                    return Err(HammerpackError::UnresolvedTask {
                        task,
                        expression: expr.to_string(),
                    });
                }

                entries.insert(
                    task.clone(),
                    PlanEntry {
                        deps: previous.clone(),
                        has_unit,
                    },
                );
                if !next.contains(&task) {
                    next.push(task);
                }
            }

            previous = next;
        }

        Ok(Self { entries })
    }

    /// Fold `other` into this plan. Entries in `other` replace existing ones.
    pub fn merge(&mut self, other: ExecutionPlan) {
        self.entries.extend(other.entries);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, task: &str) -> bool {
        self.entries.contains_key(task)
    }

    /// All planned names, sorted.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entry(&self, task: &str) -> Option<&PlanEntry> {
        self.entries.get(task)
    }

    pub fn dependencies_of(&self, task: &str) -> &[TaskName] {
        self.entries
            .get(task)
            .map(|e| e.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks that list `task` among their prerequisites.
    pub fn dependents_of(&self, task: &str) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|(_, e)| e.deps.iter().any(|d| d == task))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Check that every prerequisite is itself planned and that the plan is
    /// acyclic.
    pub fn validate(&self) -> Result<()> {
        for (task, entry) in &self.entries {
            for dep in &entry.deps {
                if !self.entries.contains_key(dep) {
                    return Err(HammerpackError::UnresolvedDependency {
                        task: task.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        self.topological_order().map(|_| ())
    }

    /// Names in an order where every task follows its prerequisites.
    pub fn topological_order(&self) -> Result<Vec<TaskName>> {
        // Edge direction: dep -> task.
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for (task, entry) in &self.entries {
            graph.add_node(task.as_str());
            for dep in &entry.deps {
                if dep == task {
                    return Err(HammerpackError::PlanCycle(format!(
                        "task '{task}' depends on itself"
                    )));
                }
                graph.add_edge(dep.as_str(), task.as_str(), ());
            }
        }

        match toposort(&graph, None) {
            Ok(order) => Ok(order.into_iter().map(str::to_string).collect()),
            Err(cycle) => Err(HammerpackError::PlanCycle(format!(
                "cycle involving task '{}'",
                cycle.node_id()
            ))),
        }
    }
}

impl fmt::Display for ExecutionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (task, entry) in &self.entries {
            let marker = if entry.has_unit { "" } else { " (no unit)" };
            if entry.deps.is_empty() {
                writeln!(f, "{task}{marker}")?;
            } else {
                writeln!(f, "{task}{marker} <- {}", entry.deps.join(", "))?;
            }
        }
        Ok(())
    }
}
