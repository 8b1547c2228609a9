// src/watch/mod.rs

//! File-system watching for develop mode.
//!
//! - [`patterns`] holds the glob filters and directory walks.
//! - [`watcher`] bridges `notify` into the develop loop's channel.

pub mod patterns;
pub mod watcher;

use std::fmt;
use std::path::{Path, PathBuf};

use notify::EventKind;
use notify::event::{CreateKind, ModifyKind, RemoveKind};

pub use patterns::{DEFAULT_EXCLUDES, PathFilter, collect_matching_files, relative_path};
pub use watcher::{WatcherHandle, spawn_watcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WatchEventKind {
    AddFile,
    AddDir,
    Change,
    DeleteFile,
    DeleteDir,
}

impl WatchEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatchEventKind::AddFile => "add",
            WatchEventKind::AddDir => "addDir",
            WatchEventKind::Change => "change",
            WatchEventKind::DeleteFile => "unlink",
            WatchEventKind::DeleteDir => "unlinkDir",
        }
    }
}

impl fmt::Display for WatchEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observed change to a path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub path: PathBuf,
}

impl WatchEvent {
    pub fn new(kind: WatchEventKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Map a notify event kind onto a [`WatchEventKind`]. Access and metadata
/// events are noise and map to `None`.
///
/// Renames carry no reliable direction, so the path is checked: present means
/// it was added, absent means it went away.
pub fn classify(kind: &EventKind, path: &Path) -> Option<WatchEventKind> {
    match kind {
        EventKind::Access(_) => None,
        EventKind::Create(CreateKind::Folder) => Some(WatchEventKind::AddDir),
        EventKind::Create(CreateKind::File) => Some(WatchEventKind::AddFile),
        EventKind::Create(_) => Some(added(path)),
        EventKind::Remove(RemoveKind::Folder) => Some(WatchEventKind::DeleteDir),
        EventKind::Remove(_) => Some(WatchEventKind::DeleteFile),
        EventKind::Modify(ModifyKind::Metadata(_)) => None,
        EventKind::Modify(ModifyKind::Name(_)) => {
            if path.exists() {
                Some(added(path))
            } else {
                Some(WatchEventKind::DeleteFile)
            }
        }
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => Some(WatchEventKind::Change),
    }
}

fn added(path: &Path) -> WatchEventKind {
    if path.is_dir() {
        WatchEventKind::AddDir
    } else {
        WatchEventKind::AddFile
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, DataChange, MetadataKind, RenameMode};

    #[test]
    fn classifies_common_kinds() {
        let p = Path::new("/nowhere/at/all.txt");
        assert_eq!(
            classify(&EventKind::Create(CreateKind::File), p),
            Some(WatchEventKind::AddFile)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::Folder), p),
            Some(WatchEventKind::DeleteDir)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content)), p),
            Some(WatchEventKind::Change)
        );
        assert_eq!(classify(&EventKind::Access(AccessKind::Any), p), None);
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), p),
            None
        );
    }

    #[test]
    fn rename_checks_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let rename = EventKind::Modify(ModifyKind::Name(RenameMode::Any));

        assert_eq!(classify(&rename, dir.path()), Some(WatchEventKind::AddDir));
        assert_eq!(
            classify(&rename, &dir.path().join("gone.txt")),
            Some(WatchEventKind::DeleteFile)
        );
    }
}
