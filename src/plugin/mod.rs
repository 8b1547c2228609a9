// src/plugin/mod.rs

//! Plugins are the units of work a task's ordering expression names.
//!
//! Each `[plugin.<name>]` manifest section becomes one [`TaskPlugin`] in the
//! [`PluginRegistry`]. Plugin instances live as long as the job, so state such
//! as an incremental compiler survives between develop cycles.

pub mod command;
pub mod transform;

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::{IncrementalFileCache, TieredCache};
use crate::cancel::CancellationToken;
use crate::config::{Manifest, PluginConfig};
use crate::types::TaskType;
use crate::watch::WatchEvent;

pub use command::CommandPlugin;
pub use transform::{FileTransform, TransformPlugin};

/// Everything one plugin invocation gets to see.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub plugin: String,
    pub task_type: TaskType,
    /// Project root; relative manifest paths resolve from here.
    pub root: PathBuf,
    pub cache: Arc<TieredCache>,
    pub files: IncrementalFileCache,
    pub cancellation: CancellationToken,
    /// File-system changes that triggered this run. Empty on the first run.
    pub changes: Vec<WatchEvent>,
}

pub type PluginFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<Value>> + Send + 'a>>;

pub trait TaskPlugin: Send + Sync {
    fn name(&self) -> &str;

    /// Run once. The returned value ends up in the run report; an error
    /// fails the unit and skips its dependents.
    fn execute(&self, ctx: PluginContext) -> PluginFuture<'_>;
}

#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: BTreeMap<String, Arc<dyn TaskPlugin>>,
}

impl std::fmt::Debug for PluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginRegistry")
            .field("plugins", &self.plugins.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One plugin per `[plugin.<name>]` section.
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let mut registry = Self::new();
        for (name, config) in manifest.plugins() {
            let plugin: Arc<dyn TaskPlugin> = match config {
                PluginConfig::Command(c) => Arc::new(CommandPlugin::new(name, c.clone())),
                PluginConfig::Transform(t) => Arc::new(TransformPlugin::new(name, t.clone())),
            };
            registry.register(plugin);
        }
        registry
    }

    /// Add a plugin under its own name, replacing any earlier one.
    pub fn register(&mut self, plugin: Arc<dyn TaskPlugin>) -> &mut Self {
        self.plugins.insert(plugin.name().to_string(), plugin);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TaskPlugin>> {
        self.plugins.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plugins.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}
