// src/plugin/command.rs

//! Runs one shell command per invocation.

use std::process::Stdio;

use anyhow::{Context, anyhow};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::CommandPluginConfig;
use crate::errors::HammerpackError;
use crate::plugin::{PluginContext, PluginFuture, TaskPlugin};

#[derive(Debug, Clone)]
pub struct CommandPlugin {
    name: String,
    config: CommandPluginConfig,
}

impl CommandPlugin {
    pub fn new(name: impl Into<String>, config: CommandPluginConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }
}

impl TaskPlugin for CommandPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: PluginContext) -> PluginFuture<'_> {
        Box::pin(async move {
            let code = run_command(&self.name, &self.config, &ctx).await?;
            Ok(json!({ "exitCode": code }))
        })
    }
}

/// Platform shell invocation of `cmd`.
pub(crate) fn shell_command(cmd: &str) -> Command {
    if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    }
}

async fn run_command(
    plugin: &str,
    config: &CommandPluginConfig,
    ctx: &PluginContext,
) -> anyhow::Result<i32> {
    let cwd = match &config.cwd {
        Some(dir) => ctx.root.join(dir),
        None => ctx.root.clone(),
    };
    let changed = ctx
        .changes
        .iter()
        .map(|c| c.path.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    info!(plugin, cmd = %config.cmd, cwd = %cwd.display(), "starting command");

    let mut cmd = shell_command(&config.cmd);
    cmd.current_dir(&cwd)
        .env("HAMMERPACK_TASK", ctx.task_type.as_str())
        .env("HAMMERPACK_PLUGIN", plugin)
        .env("HAMMERPACK_CHANGED", changed)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning command for plugin '{plugin}'"))?;

    if let Some(stdout) = child.stdout.take() {
        let plugin = plugin.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(plugin = %plugin, "{line}");
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let plugin = plugin.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(plugin = %plugin, "stderr: {line}");
            }
        });
    }

    tokio::select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("waiting for command of plugin '{plugin}'"))?;
            let code = status.code().unwrap_or(-1);
            info!(plugin, exit_code = code, success = status.success(), "command exited");
            if status.success() {
                Ok(code)
            } else {
                Err(anyhow!("command `{}` exited with code {code}", config.cmd))
            }
        }
        _ = ctx.cancellation.cancelled() => {
            info!(plugin, "cancellation requested; killing command");
            if let Err(e) = child.kill().await {
                warn!(plugin, error = %e, "failed to kill command on cancellation");
            }
            Err(HammerpackError::Cancelled.into())
        }
    }
}
