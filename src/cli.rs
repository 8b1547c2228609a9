// src/cli.rs

//! Command-line arguments.

use clap::{Parser, ValueEnum};

use crate::types::TaskType;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "hammerpack",
    version,
    about = "Run the plugins a project manifest assigns to a task, incrementally.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run. `develop` keeps watching and reruns on change.
    #[arg(value_enum)]
    pub task: TaskType,

    /// Path to the manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "hammerpack.toml")]
    pub config: String,

    /// Validate the manifest and print the plan without running anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `HAMMERPACK_LOG` or `info` is used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_task_and_flags() {
        let args =
            CliArgs::try_parse_from(["hammerpack", "build", "--dry-run", "--config", "x.toml"]).unwrap();
        assert_eq!(args.task, TaskType::Build);
        assert!(args.dry_run);
        assert_eq!(args.config, "x.toml");
    }

    #[test]
    fn rejects_unknown_task() {
        assert!(CliArgs::try_parse_from(["hammerpack", "bundle"]).is_err());
    }
}
