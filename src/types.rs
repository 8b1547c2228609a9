use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::Deserialize;

/// The kind of top-level task a manifest can declare.
///
/// Each task is keyed by its type in the manifest (`[task.build]`,
/// `[task.develop]`, ...). `Develop` is the only type that keeps running and
/// rebuilds on file-system changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Develop,
    Build,
    Test,
    Deploy,
    Run,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Develop => "develop",
            TaskType::Build => "build",
            TaskType::Test => "test",
            TaskType::Deploy => "deploy",
            TaskType::Run => "run",
        }
    }

    /// Whether this task keeps watching the project after the first run.
    pub fn is_watching(&self) -> bool {
        matches!(self, TaskType::Develop)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "develop" => Ok(TaskType::Develop),
            "build" => Ok(TaskType::Build),
            "test" => Ok(TaskType::Test),
            "deploy" => Ok(TaskType::Deploy),
            "run" => Ok(TaskType::Run),
            other => Err(format!(
                "invalid task type: {other} (expected one of develop, build, test, deploy, run)"
            )),
        }
    }
}

/// Where the durable cache tier lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStorage {
    /// Persist entries under the configured cache directory.
    File,
    /// Keep a durable tier in memory (lost on restart).
    Memory,
    /// No durable tier at all; the cache is volatile-only.
    None,
}

impl Default for CacheStorage {
    fn default() -> Self {
        CacheStorage::File
    }
}

impl FromStr for CacheStorage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "file" => Ok(CacheStorage::File),
            "memory" => Ok(CacheStorage::Memory),
            "none" => Ok(CacheStorage::None),
            other => Err(format!(
                "invalid cache storage: {other} (expected \"file\", \"memory\" or \"none\")"
            )),
        }
    }
}
