// src/plugin/transform.rs

//! Incrementally transforms a source tree into a destination tree.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use anyhow::{Context, anyhow};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::TransformPluginConfig;
use crate::errors::HammerpackError;
use crate::incremental::{IncrementalCompiler, Transform, TransformFuture, TransformOutput};
use crate::plugin::command::shell_command;
use crate::plugin::{PluginContext, PluginFuture, TaskPlugin};
use crate::watch::patterns::{PathFilter, collect_matching_files};

/// How one file's contents become its output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileTransform {
    /// Copy UTF-8 text unchanged.
    Identity,
    /// Pipe the file through a shell command; stdout is the output.
    Shell(String),
}

impl Transform for FileTransform {
    fn transform<'a>(&'a self, source: &'a Path, contents: &'a [u8]) -> TransformFuture<'a> {
        Box::pin(async move {
            let text = match self {
                FileTransform::Identity => String::from_utf8(contents.to_vec())
                    .with_context(|| format!("{} is not valid UTF-8", source.display()))?,
                FileTransform::Shell(cmd) => pipe_through(cmd, source, contents).await?,
            };
            Ok(TransformOutput {
                text,
                ..TransformOutput::default()
            })
        })
    }
}

async fn pipe_through(cmd: &str, source: &Path, contents: &[u8]) -> anyhow::Result<String> {
    let mut child = shell_command(cmd)
        .env("HAMMERPACK_FILE", source)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("spawning transform `{cmd}`"))?;

    // Feed stdin concurrently so a large output cannot fill the pipe first.
    let writer = child.stdin.take().map(|mut stdin| {
        let data = contents.to_vec();
        tokio::spawn(async move {
            let res = stdin.write_all(&data).await;
            drop(stdin);
            res
        })
    });

    let output = child
        .wait_with_output()
        .await
        .with_context(|| format!("waiting for transform `{cmd}`"))?;

    if let Some(writer) = writer {
        // A command that ignores stdin closes the pipe early; only its exit
        // status matters.
        if let Ok(Err(e)) = writer.await {
            debug!(error = %e, "transform did not read all of stdin");
        }
    }

    if !output.status.success() {
        return Err(anyhow!(
            "transform `{cmd}` failed on {} with code {}: {}",
            source.display(),
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    String::from_utf8(output.stdout)
        .with_context(|| format!("transform `{cmd}` produced non UTF-8 output"))
}

pub struct TransformPlugin {
    name: String,
    config: TransformPluginConfig,
    /// Built on first use; reused by later develop cycles.
    compiler: Mutex<Option<IncrementalCompiler<FileTransform>>>,
}

impl std::fmt::Debug for TransformPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPlugin")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl TransformPlugin {
    pub fn new(name: impl Into<String>, config: TransformPluginConfig) -> Self {
        Self {
            name: name.into(),
            config,
            compiler: Mutex::new(None),
        }
    }

    fn file_transform(&self) -> FileTransform {
        match &self.config.cmd {
            Some(cmd) => FileTransform::Shell(cmd.clone()),
            None => FileTransform::Identity,
        }
    }

    fn source_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.config.source)
    }
}

impl TaskPlugin for TransformPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, ctx: PluginContext) -> PluginFuture<'_> {
        Box::pin(async move {
            let source_dir = self.source_dir(&ctx.root);
            if !source_dir.is_dir() {
                return Err(anyhow!(
                    "source directory {} of plugin '{}' does not exist",
                    source_dir.display(),
                    self.name
                ));
            }

            let filter = PathFilter::new(&self.config.include, &self.config.exclude)?;
            let sources = collect_matching_files(&source_dir, &filter)?;
            debug!(plugin = %self.name, files = sources.len(), "collected transform sources");

            let mut guard = self.compiler.lock().await;
            let compiler = guard.get_or_insert_with(|| {
                IncrementalCompiler::new(
                    &ctx.root,
                    &source_dir,
                    ctx.root.join(&self.config.destination),
                    ctx.files.clone(),
                    self.file_transform(),
                )
            });

            let summary = compiler
                .compile(&sources, &ctx.cancellation)
                .await
                .map_err(|e| match e {
                    HammerpackError::Cancelled => anyhow::Error::from(HammerpackError::Cancelled),
                    other => anyhow::Error::from(other)
                        .context(format!("plugin '{}' failed to compile", self.name)),
                })?;

            Ok(json!({
                "files": sources.len(),
                "hits": summary.hits,
                "misses": summary.misses,
                "written": summary.written,
                "removed": summary.removed,
                "watched": summary.watch.len(),
            }))
        })
    }
}
