use std::collections::BTreeMap;
use std::path::PathBuf;

use hammerpack::config::{
    CacheSection, CommandPluginConfig, Manifest, PluginConfig, ProjectSection, RawManifest,
    TaskConfig, TransformPluginConfig, WatchSection,
};
use hammerpack::errors::Result;
use hammerpack::types::{CacheStorage, TaskType};

/// Builder for [`Manifest`] to simplify test setup.
pub struct ManifestBuilder {
    raw: RawManifest,
}

impl ManifestBuilder {
    pub fn new() -> Self {
        Self {
            raw: RawManifest {
                config: ProjectSection::default(),
                cache: CacheSection {
                    storage: CacheStorage::Memory,
                    ..CacheSection::default()
                },
                watch: WatchSection::default(),
                plugin: BTreeMap::new(),
                task: BTreeMap::new(),
            },
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.raw.config.name = Some(name.to_string());
        self
    }

    pub fn storage(mut self, storage: CacheStorage) -> Self {
        self.raw.cache.storage = storage;
        self
    }

    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.raw.cache.directory = dir.into();
        self
    }

    pub fn watch_exclude(mut self, pattern: &str) -> Self {
        self.raw.watch.exclude.push(pattern.to_string());
        self
    }

    pub fn command_plugin(mut self, name: &str, cmd: &str) -> Self {
        self.raw.plugin.insert(
            name.to_string(),
            PluginConfig::Command(CommandPluginConfig {
                cmd: cmd.to_string(),
                cwd: None,
            }),
        );
        self
    }

    pub fn transform_plugin(mut self, name: &str, source: &str, destination: &str) -> Self {
        self.raw.plugin.insert(
            name.to_string(),
            PluginConfig::Transform(TransformPluginConfig {
                source: source.into(),
                destination: destination.into(),
                include: Vec::new(),
                exclude: Vec::new(),
                cmd: None,
            }),
        );
        self
    }

    /// Declare `names` as placeholder command plugins, to be replaced by
    /// fakes registered on the job.
    pub fn placeholders(mut self, names: &[&str]) -> Self {
        for name in names {
            self = self.command_plugin(name, "true");
        }
        self
    }

    pub fn task(mut self, task_type: TaskType, expression: &str) -> Self {
        self.raw.task.insert(
            task_type.as_str().to_string(),
            TaskConfig {
                steps: expression.into(),
            },
        );
        self
    }

    pub fn raw(self) -> RawManifest {
        self.raw
    }

    pub fn try_build(self) -> Result<Manifest> {
        Manifest::try_from(self.raw)
    }

    pub fn build(self) -> Manifest {
        self.try_build()
            .expect("Failed to build valid manifest from builder")
    }
}

impl Default for ManifestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
