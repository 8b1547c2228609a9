// src/config/mod.rs

//! The `hammerpack.toml` manifest.
//!
//! - `model.rs` is the serde data model.
//! - `loader.rs` reads it from disk.
//! - `validate.rs` turns a [`RawManifest`] into a checked [`Manifest`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, manifest_root};
pub use model::{
    CacheSection, CommandPluginConfig, Manifest, PluginConfig, ProjectSection, RawManifest,
    TaskConfig, TransformPluginConfig, WatchSection,
};
