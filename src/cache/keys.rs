// src/cache/keys.rs

//! Cache key conventions: `"<file>:<hash>"` for per-file entries and
//! `"<plugin>"` / `"<plugin>:<key>"` for plugin-scoped entries.

use std::borrow::Cow;

use crate::errors::{HammerpackError, Result};

/// A per-file cache key: relative filename plus content hash.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FileCacheKey {
    pub filename: String,
    /// Empty when the composed key had no hash part.
    pub hash: String,
}

impl FileCacheKey {
    pub fn new(filename: impl Into<String>, hash: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            hash: hash.into(),
        }
    }
}

/// A plugin-scoped cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PluginCacheKey {
    pub plugin_name: String,
    pub key: Option<String>,
}

impl PluginCacheKey {
    pub fn new(plugin_name: impl Into<String>, key: Option<String>) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            key,
        }
    }
}

pub fn compose_file_key(key: &FileCacheKey) -> String {
    format!("{}:{}", key.filename, key.hash)
}

/// Split at the first `:`. A key without one, or starting with one, is all
/// filename.
pub fn decompose_file_key(key: &str) -> FileCacheKey {
    match split_first_colon(key) {
        Some((filename, hash)) => FileCacheKey::new(filename, hash),
        None => FileCacheKey::new(key, ""),
    }
}

pub fn compose_plugin_key(key: &PluginCacheKey) -> Result<String> {
    if key.plugin_name.is_empty() {
        return Err(HammerpackError::InvalidArgument(
            "plugin cache key needs a plugin name".to_string(),
        ));
    }

    Ok(match key.key.as_deref() {
        Some(k) if !k.is_empty() => format!("{}:{k}", key.plugin_name),
        _ => key.plugin_name.clone(),
    })
}

pub fn decompose_plugin_key(key: &str) -> PluginCacheKey {
    match split_first_colon(key) {
        Some((plugin, rest)) => PluginCacheKey::new(plugin, Some(rest.to_string())),
        None => PluginCacheKey::new(key, None),
    }
}

fn split_first_colon(key: &str) -> Option<(&str, &str)> {
    match key.find(':') {
        Some(idx) if idx > 0 => Some((&key[..idx], &key[idx + 1..])),
        _ => None,
    }
}

/// Anything that can name a cache entry: a pre-composed string or a
/// structured key.
pub trait AsCacheKey {
    fn as_cache_key(&self) -> Result<Cow<'_, str>>;
}

impl AsCacheKey for str {
    fn as_cache_key(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self))
    }
}

impl AsCacheKey for String {
    fn as_cache_key(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Borrowed(self.as_str()))
    }
}

impl AsCacheKey for FileCacheKey {
    fn as_cache_key(&self) -> Result<Cow<'_, str>> {
        Ok(Cow::Owned(compose_file_key(self)))
    }
}

impl AsCacheKey for PluginCacheKey {
    fn as_cache_key(&self) -> Result<Cow<'_, str>> {
        compose_plugin_key(self).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_key_compose_and_split() {
        let key = FileCacheKey::new("src/a.ts", "abc123");
        assert_eq!(compose_file_key(&key), "src/a.ts:abc123");
        assert_eq!(decompose_file_key("src/a.ts:abc123"), key);
    }

    #[test]
    fn file_key_split_uses_first_colon() {
        let key = decompose_file_key("a:b:c");
        assert_eq!(key.filename, "a");
        assert_eq!(key.hash, "b:c");
    }

    #[test]
    fn leading_colon_or_no_colon_is_all_filename() {
        assert_eq!(decompose_file_key(":abc"), FileCacheKey::new(":abc", ""));
        assert_eq!(decompose_file_key("plain"), FileCacheKey::new("plain", ""));
        assert_eq!(decompose_file_key(""), FileCacheKey::new("", ""));
    }

    #[test]
    fn plugin_key_with_and_without_sub_key() {
        let bare = PluginCacheKey::new("tsc", None);
        assert_eq!(compose_plugin_key(&bare).unwrap(), "tsc");

        let scoped = PluginCacheKey::new("tsc", Some("config".into()));
        assert_eq!(compose_plugin_key(&scoped).unwrap(), "tsc:config");
        assert_eq!(decompose_plugin_key("tsc:config"), scoped);
        assert_eq!(decompose_plugin_key("tsc"), bare);
    }

    #[test]
    fn plugin_key_needs_a_name() {
        let err = compose_plugin_key(&PluginCacheKey::new("", Some("k".into()))).unwrap_err();
        assert!(matches!(err, HammerpackError::InvalidArgument(_)));
    }
}
