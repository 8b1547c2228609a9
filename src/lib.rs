// src/lib.rs

pub mod cache;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod incremental;
pub mod logging;
pub mod plugin;
pub mod task;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use crate::cancel::CancellationToken;
use crate::cli::CliArgs;
use crate::config::{Manifest, PluginConfig, load_and_validate, manifest_root};
use crate::engine::{DevelopEvent, DevelopRuntime, JobLauncher};
use crate::task::Job;
use crate::types::TaskType;
use crate::watch::PathFilter;

/// Entry point used by `main.rs`: load the manifest, then run the task once
/// or, for `develop`, keep running it on every change until Ctrl-C.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let manifest = load_and_validate(&config_path)?;
    let root = project_root(&config_path);

    if args.dry_run {
        print_dry_run(&manifest, args.task);
        return Ok(());
    }

    let job = Arc::new(Job::open(manifest, &root).await?);

    if args.task.is_watching() {
        run_develop(job, args.task).await
    } else {
        run_once(job, args.task).await
    }
}

async fn run_once(job: Arc<Job>, task_type: TaskType) -> Result<()> {
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl-C received; cancelling");
                token.cancel();
            }
        });
    }

    let report = job.execute(task_type, token, Vec::new()).await?;
    let results = report.into_result()?;
    for (plugin, value) in &results {
        info!(plugin = %plugin, result = %value, "plugin finished");
    }
    info!(task = %task_type, plugins = results.len(), "task succeeded");
    Ok(())
}

async fn run_develop(job: Arc<Job>, task_type: TaskType) -> Result<()> {
    let (tx, rx) = mpsc::channel::<DevelopEvent>(64);

    let filter = PathFilter::watch_excludes(&watch_excludes(job.manifest()))?;
    let _watcher = watch::spawn_watcher(job.root(), filter, tx.clone())?;

    {
        let tx = tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(DevelopEvent::ShutdownRequested).await;
        });
    }

    let runtime = DevelopRuntime::new(rx, tx, JobLauncher::new(job, task_type));
    runtime.run().await?;
    Ok(())
}

/// Manifest excludes plus the cache directory and every transform
/// destination, so outputs never retrigger a run.
pub fn watch_excludes(manifest: &Manifest) -> Vec<String> {
    let mut excludes = manifest.watch().exclude.clone();
    excludes.extend(dir_globs(&manifest.cache().directory));
    for plugin in manifest.plugins().values() {
        if let PluginConfig::Transform(t) = plugin {
            excludes.extend(dir_globs(&t.destination));
        }
    }
    excludes
}

/// The directory itself and everything below it.
fn dir_globs(dir: &Path) -> [String; 2] {
    let dir = dir.to_string_lossy().replace('\\', "/");
    let dir = dir.trim_start_matches("./").trim_end_matches('/');
    [dir.to_string(), format!("{dir}/**")]
}

/// The manifest's directory, or the current directory for a bare filename.
fn project_root(config_path: &Path) -> PathBuf {
    let root = manifest_root(config_path);
    if root == Path::new(".") {
        std::env::current_dir().unwrap_or(root)
    } else {
        root
    }
}

fn print_dry_run(manifest: &Manifest, task_type: TaskType) {
    println!("hammerpack dry-run: {}", manifest.name());
    println!(
        "  cache.storage = {:?}, cache.directory = {}",
        manifest.cache().storage,
        manifest.cache().directory.display()
    );
    println!();

    println!("plugins ({}):", manifest.plugins().len());
    for (name, plugin) in manifest.plugins() {
        println!("  - {name} ({})", plugin.kind());
    }
    println!();

    match manifest.task(task_type) {
        Some(task) => {
            println!("task {task_type}: do = {}", task.steps);
            let plan = dag::TaskGraphRunner::new(task_type.as_str()).introspect(task.steps.clone());
            match plan.topological_order() {
                Ok(order) => {
                    for name in order {
                        let deps = plan.dependencies_of(&name);
                        if deps.is_empty() {
                            println!("  {name}");
                        } else {
                            println!("  {name} <- {}", deps.join(", "));
                        }
                    }
                }
                Err(e) => println!("  invalid plan: {e}"),
            }
        }
        None => println!("task {task_type}: not declared in the manifest"),
    }
}
