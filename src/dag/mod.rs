// src/dag/mod.rs

//! Ordering expressions, execution plans and their async runner.
//!
//! - [`expression`] splits `"a|b,c"` style expressions into series groups.
//! - [`graph`] turns groups into an [`ExecutionPlan`] and checks it.
//! - [`scheduler`] is the pure per-run state machine.
//! - [`runner`] spawns units of work and drives the scheduler.
//! - [`report`] collects what happened.

pub mod expression;
pub mod graph;
pub mod report;
pub mod runner;
pub mod scheduler;

pub use expression::OrderingExpr;
pub use graph::{ExecutionPlan, PlanEntry, TaskName};
pub use report::{RunReport, UnitOutcome};
pub use runner::{TaskGraphRunner, UnitContext, UnitFuture, UnitOfWork};
pub use scheduler::{RunState, Scheduler, SchedulerStep, SkipReason};
