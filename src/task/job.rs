// src/task/job.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::cache::{FileStore, IncrementalFileCache, MemoryStore, TieredCache};
use crate::cancel::CancellationToken;
use crate::config::Manifest;
use crate::dag::{ExecutionPlan, RunReport};
use crate::errors::{HammerpackError, Result};
use crate::plugin::{PluginRegistry, TaskPlugin};
use crate::task::Task;
use crate::types::{CacheStorage, TaskType};
use crate::watch::WatchEvent;

/// A loaded project: manifest, plugins and the shared cache.
#[derive(Debug)]
pub struct Job {
    root: PathBuf,
    manifest: Manifest,
    registry: PluginRegistry,
    cache: Arc<TieredCache>,
}

impl Job {
    /// Build the job and open the durable cache tier `[cache]` asks for.
    pub async fn open(manifest: Manifest, root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let cache = match manifest.cache().storage {
            CacheStorage::File => {
                let dir = root.join(&manifest.cache().directory);
                let store = FileStore::open(&dir).await?;
                info!(directory = %dir.display(), "opened file cache");
                TieredCache::with_store(Arc::new(store))
            }
            CacheStorage::Memory => TieredCache::with_store(Arc::new(MemoryStore::new())),
            CacheStorage::None => TieredCache::volatile_only(),
        };
        Ok(Self::with_cache(manifest, root, Arc::new(cache)))
    }

    pub fn with_cache(manifest: Manifest, root: impl Into<PathBuf>, cache: Arc<TieredCache>) -> Self {
        let registry = PluginRegistry::from_manifest(&manifest);
        Self {
            root: root.into(),
            manifest,
            registry,
            cache,
        }
    }

    /// Replace the plugin registered under `plugin.name()`.
    pub fn register(&mut self, plugin: Arc<dyn TaskPlugin>) -> &mut Self {
        self.registry.register(plugin);
        self
    }

    pub fn name(&self) -> &str {
        self.manifest.name()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<TieredCache> {
        &self.cache
    }

    pub fn files(&self) -> IncrementalFileCache {
        IncrementalFileCache::new(self.cache.clone())
    }

    pub fn task(&self, task_type: TaskType) -> Result<Task> {
        let config = self.manifest.task(task_type).ok_or_else(|| {
            HammerpackError::ConfigError(format!("no [task.{task_type}] section in the manifest"))
        })?;
        Ok(Task::new(task_type, config.steps.clone()))
    }

    pub fn plan(&self, task_type: TaskType) -> Result<ExecutionPlan> {
        Ok(self.task(task_type)?.plan(self))
    }

    pub async fn execute(
        &self,
        task_type: TaskType,
        token: CancellationToken,
        changes: Vec<WatchEvent>,
    ) -> Result<RunReport> {
        self.task(task_type)?.execute(self, token, changes).await
    }
}
