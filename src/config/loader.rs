// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{Manifest, RawManifest};
use crate::errors::Result;

/// Read and deserialize a manifest without semantic checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawManifest> {
    let contents = fs::read_to_string(path.as_ref())?;
    let raw: RawManifest = toml::from_str(&contents)?;
    Ok(raw)
}

/// Read a manifest and validate it: task types, plugin references, plan
/// cycles and cache settings.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Manifest> {
    let raw = load_from_path(&path)?;
    Manifest::try_from(raw)
}

/// `hammerpack.toml` in the current directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("hammerpack.toml")
}

/// Directory the manifest lives in; relative paths in it resolve from here.
pub fn manifest_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_and_validates_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            [plugin.echo]
            kind = "command"
            cmd = "echo hi"

            [task.run]
            do = "echo"
            "#
        )
        .unwrap();

        let manifest = load_and_validate(file.path()).unwrap();
        assert!(manifest.task(crate::types::TaskType::Run).is_some());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = load_from_path("/definitely/not/here/hammerpack.toml").unwrap_err();
        assert!(matches!(err, crate::errors::HammerpackError::IoError(_)));
    }

    #[test]
    fn manifest_root_of_bare_name_is_cwd() {
        assert_eq!(manifest_root(Path::new("hammerpack.toml")), PathBuf::from("."));
        assert_eq!(
            manifest_root(Path::new("proj/hammerpack.toml")),
            PathBuf::from("proj")
        );
    }
}
