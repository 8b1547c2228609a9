// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HammerpackError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A name in an ordering expression has no registered unit of work.
    #[error("Cannot find the unit of work for '{task}' in {expression}")]
    UnresolvedTask { task: String, expression: String },

    /// A planned task depends on a name that was never planned.
    #[error("Task '{task}' depends on '{dependency}', which is not part of the plan")]
    UnresolvedDependency { task: String, dependency: String },

    #[error("Nothing to run for '{0}': no execution plan has been built")]
    MissingPlan(String),

    #[error("Cycle detected in execution plan: {0}")]
    PlanCycle(String),

    #[error("Durable store error: {0}")]
    Storage(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HammerpackError>;
