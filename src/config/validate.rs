// src/config/validate.rs

use std::collections::BTreeMap;

use globset::Glob;

use crate::config::model::{Manifest, PluginConfig, RawManifest, TaskConfig};
use crate::dag::ExecutionPlan;
use crate::errors::{HammerpackError, Result};
use crate::types::{CacheStorage, TaskType};

impl TryFrom<RawManifest> for Manifest {
    type Error = HammerpackError;

    fn try_from(raw: RawManifest) -> std::result::Result<Self, Self::Error> {
        let tasks = validate_raw_manifest(&raw)?;
        Ok(Manifest::new_unchecked(
            raw.config, raw.cache, raw.watch, raw.plugin, tasks,
        ))
    }
}

fn validate_raw_manifest(cfg: &RawManifest) -> Result<BTreeMap<TaskType, TaskConfig>> {
    ensure_has_tasks(cfg)?;
    validate_cache_section(cfg)?;
    validate_plugins(cfg)?;
    let tasks = parse_task_types(cfg)?;
    for (task_type, task) in &tasks {
        validate_task_plan(cfg, *task_type, task)?;
    }
    Ok(tasks)
}

fn ensure_has_tasks(cfg: &RawManifest) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(HammerpackError::ConfigError(
            "manifest must contain at least one [task.<type>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_cache_section(cfg: &RawManifest) -> Result<()> {
    if cfg.cache.storage == CacheStorage::File && cfg.cache.directory.as_os_str().is_empty() {
        return Err(HammerpackError::ConfigError(
            "[cache].directory must not be empty when storage = \"file\"".to_string(),
        ));
    }
    Ok(())
}

fn validate_plugins(cfg: &RawManifest) -> Result<()> {
    for (name, plugin) in &cfg.plugin {
        if name.contains(':') {
            return Err(HammerpackError::ConfigError(format!(
                "plugin name '{name}' must not contain ':'"
            )));
        }

        match plugin {
            PluginConfig::Command(c) => {
                if c.cmd.trim().is_empty() {
                    return Err(HammerpackError::ConfigError(format!(
                        "[plugin.{name}].cmd must not be empty"
                    )));
                }
            }
            PluginConfig::Transform(t) => {
                for pat in t.include.iter().chain(t.exclude.iter()) {
                    Glob::new(pat).map_err(|e| {
                        HammerpackError::ConfigError(format!(
                            "[plugin.{name}] has invalid glob '{pat}': {e}"
                        ))
                    })?;
                }
                if t.cmd.as_deref().is_some_and(|c| c.trim().is_empty()) {
                    return Err(HammerpackError::ConfigError(format!(
                        "[plugin.{name}].cmd must not be empty when given"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn parse_task_types(cfg: &RawManifest) -> Result<BTreeMap<TaskType, TaskConfig>> {
    let mut tasks = BTreeMap::new();
    for (key, task) in &cfg.task {
        let task_type: TaskType = key
            .parse()
            .map_err(|e| HammerpackError::ConfigError(format!("[task.{key}]: {e}")))?;
        if tasks.insert(task_type, task.clone()).is_some() {
            return Err(HammerpackError::ConfigError(format!(
                "task type '{task_type}' is declared more than once"
            )));
        }
    }
    Ok(tasks)
}

fn validate_task_plan(cfg: &RawManifest, task_type: TaskType, task: &TaskConfig) -> Result<()> {
    if task.steps.is_empty() {
        return Err(HammerpackError::ConfigError(format!(
            "[task.{task_type}].do must name at least one plugin"
        )));
    }

    let plan = ExecutionPlan::from_expression(&task.steps, |n| cfg.plugin.contains_key(n), true)
        .map_err(|e| match e {
            HammerpackError::UnresolvedTask { task: plugin, expression } => {
                HammerpackError::ConfigError(format!(
                    "[task.{task_type}] uses undeclared plugin '{plugin}' in {expression}"
                ))
            }
            other => other,
        })?;

    plan.validate()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Manifest> {
        let raw: RawManifest = toml::from_str(text)?;
        Manifest::try_from(raw)
    }

    const PLUGINS: &str = r#"
        [plugin.a]
        kind = "command"
        cmd = "true"

        [plugin.b]
        kind = "transform"
        source = "src"
        destination = "dist"
    "#;

    #[test]
    fn minimal_manifest_is_valid() {
        let m = parse(&format!("{PLUGINS}\n[task.build]\ndo = \"a|b\"")).unwrap();
        assert_eq!(m.name(), "hammerpack");
        assert_eq!(m.cache().storage, CacheStorage::File);
        assert!(m.task(TaskType::Build).is_some());
        assert_eq!(m.plugins()["b"].kind(), "transform");
    }

    #[test]
    fn rejects_missing_tasks() {
        let err = parse(PLUGINS).unwrap_err();
        assert!(err.to_string().contains("at least one [task.<type>]"));
    }

    #[test]
    fn rejects_unknown_task_type() {
        let err = parse(&format!("{PLUGINS}\n[task.bundle]\ndo = \"a\"")).unwrap_err();
        assert!(err.to_string().contains("[task.bundle]"));
    }

    #[test]
    fn rejects_undeclared_plugin() {
        let err = parse(&format!("{PLUGINS}\n[task.build]\ndo = \"a,missing\"")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("missing"));
        assert!(msg.contains("\"a,missing\""));
    }

    #[test]
    fn rejects_empty_expression() {
        let err = parse(&format!("{PLUGINS}\n[task.build]\ndo = \" , \"")).unwrap_err();
        assert!(err.to_string().contains("at least one plugin"));
    }

    #[test]
    fn rejects_repeated_plugin_as_cycle() {
        let err = parse(&format!("{PLUGINS}\n[task.build]\ndo = \"a,b,a\"")).unwrap_err();
        assert!(matches!(err, HammerpackError::PlanCycle(_)));
    }

    #[test]
    fn rejects_empty_cache_directory() {
        let err = parse(&format!(
            "[cache]\nstorage = \"file\"\ndirectory = \"\"\n{PLUGINS}\n[task.build]\ndo = \"a\""
        ))
        .unwrap_err();
        assert!(err.to_string().contains("[cache].directory"));
    }

    #[test]
    fn rejects_bad_glob() {
        let err = parse(
            r#"
            [plugin.t]
            kind = "transform"
            source = "src"
            destination = "dist"
            include = ["src/[oops"]

            [task.build]
            do = "t"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid glob"));
    }

    #[test]
    fn list_form_expression_is_accepted() {
        let m = parse(&format!("{PLUGINS}\n[task.test]\ndo = [\"a|b\", \"a\"]"));
        // `a` appears in both groups, which makes it depend on itself.
        assert!(matches!(m, Err(HammerpackError::PlanCycle(_))));

        let m = parse(&format!("{PLUGINS}\n[task.test]\ndo = [\"a\", \"b\"]")).unwrap();
        assert_eq!(
            m.task(TaskType::Test).unwrap().steps,
            crate::dag::OrderingExpr::from(vec!["a", "b"])
        );
    }
}
