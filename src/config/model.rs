// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::dag::OrderingExpr;
use crate::types::{CacheStorage, TaskType};

/// Manifest as read from `hammerpack.toml`, before validation.
///
/// ```toml
/// [config]
/// name = "demo"
///
/// [cache]
/// storage = "file"
/// directory = ".hammerpack/cache"
///
/// [watch]
/// exclude = ["target/**"]
///
/// [plugin.compile]
/// kind = "transform"
/// source = "src"
/// destination = "dist"
///
/// [task.build]
/// do = "compile"
/// ```
///
/// Task keys stay plain strings here so an unknown task type is reported by
/// validation with the offending key, not as a serde error.
#[derive(Debug, Clone, Deserialize)]
pub struct RawManifest {
    #[serde(default)]
    pub config: ProjectSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub watch: WatchSection,

    #[serde(default)]
    pub plugin: BTreeMap<String, PluginConfig>,

    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// Validated manifest. Build it with `Manifest::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct Manifest {
    config: ProjectSection,
    cache: CacheSection,
    watch: WatchSection,
    plugin: BTreeMap<String, PluginConfig>,
    task: BTreeMap<TaskType, TaskConfig>,
}

impl Manifest {
    pub(crate) fn new_unchecked(
        config: ProjectSection,
        cache: CacheSection,
        watch: WatchSection,
        plugin: BTreeMap<String, PluginConfig>,
        task: BTreeMap<TaskType, TaskConfig>,
    ) -> Self {
        Self {
            config,
            cache,
            watch,
            plugin,
            task,
        }
    }

    /// Project name, falling back to `"hammerpack"`.
    pub fn name(&self) -> &str {
        self.config.name.as_deref().unwrap_or("hammerpack")
    }

    pub fn cache(&self) -> &CacheSection {
        &self.cache
    }

    pub fn watch(&self) -> &WatchSection {
        &self.watch
    }

    pub fn plugins(&self) -> &BTreeMap<String, PluginConfig> {
        &self.plugin
    }

    pub fn tasks(&self) -> &BTreeMap<TaskType, TaskConfig> {
        &self.task
    }

    pub fn task(&self, task_type: TaskType) -> Option<&TaskConfig> {
        self.task.get(&task_type)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectSection {
    #[serde(default)]
    pub name: Option<String>,
}

/// `[cache]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheSection {
    #[serde(default)]
    pub storage: CacheStorage,

    /// Directory for file storage, relative to the project root.
    #[serde(default = "default_cache_directory")]
    pub directory: PathBuf,
}

pub fn default_cache_directory() -> PathBuf {
    PathBuf::from(".hammerpack/cache")
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            storage: CacheStorage::default(),
            directory: default_cache_directory(),
        }
    }
}

/// `[watch]` section; only used by `develop`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WatchSection {
    /// Extra globs (relative to the project root) whose changes are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// `[plugin.<name>]` section, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PluginConfig {
    Command(CommandPluginConfig),
    Transform(TransformPluginConfig),
}

impl PluginConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            PluginConfig::Command(_) => "command",
            PluginConfig::Transform(_) => "transform",
        }
    }
}

/// Run one shell command.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommandPluginConfig {
    pub cmd: String,

    /// Working directory relative to the project root.
    #[serde(default)]
    pub cwd: Option<PathBuf>,
}

/// Incrementally transform every matching file under `source` into
/// `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TransformPluginConfig {
    pub source: PathBuf,
    pub destination: PathBuf,

    /// Globs relative to `source`; everything when empty.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub exclude: Vec<String>,

    /// Shell command fed each file on stdin; its stdout is the output.
    /// Files are copied unchanged when absent.
    #[serde(default)]
    pub cmd: Option<String>,
}

/// `[task.<type>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaskConfig {
    /// Ordering expression over plugin names.
    #[serde(rename = "do")]
    pub steps: OrderingExpr,
}
