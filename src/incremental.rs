// src/incremental.rs

//! Incremental per-file compilation backed by the file cache.
//!
//! Every source file is hashed and looked up under `(relative filename,
//! hash)`. A hit restores the recorded outputs without running the
//! transform; a miss runs it and records the result. Destinations are only
//! rewritten when their contents differ, so unchanged outputs keep their
//! timestamps.

use std::collections::BTreeSet;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use anyhow::Context;
use tracing::{debug, info, warn};

use crate::cache::{FileCacheKey, FileCacheValue, IncrementalFileCache, content_hash};
use crate::cancel::CancellationToken;
use crate::errors::Result;

/// What a transform produced for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutput {
    pub text: String,
    pub map: Option<String>,
    pub definition: Option<String>,
    /// Other files this one depends on, relative to the project root.
    pub dependencies: Vec<String>,
}

pub type TransformFuture<'a> = Pin<Box<dyn Future<Output = anyhow::Result<TransformOutput>> + Send + 'a>>;

/// A per-file source transformation.
pub trait Transform: Send + Sync {
    fn transform<'a>(&'a self, source: &'a Path, contents: &'a [u8]) -> TransformFuture<'a>;
}

/// Counters and watch set from one compile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompileSummary {
    pub hits: usize,
    pub misses: usize,
    /// Destinations actually (re)written.
    pub written: usize,
    pub removed: usize,
    /// Sources plus recorded dependencies, as absolute paths.
    pub watch: BTreeSet<PathBuf>,
}

pub struct IncrementalCompiler<T: Transform> {
    root: PathBuf,
    source_dir: PathBuf,
    dest_dir: PathBuf,
    files: IncrementalFileCache,
    transform: T,
    /// Sources seen by the last completed pass.
    known_sources: BTreeSet<PathBuf>,
}

impl<T: Transform> IncrementalCompiler<T> {
    pub fn new(
        root: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        files: IncrementalFileCache,
        transform: T,
    ) -> Self {
        Self {
            root: root.into(),
            source_dir: source_dir.into(),
            dest_dir: dest_dir.into(),
            files,
            transform,
            known_sources: BTreeSet::new(),
        }
    }

    /// Destination path of `source`: same relative position under the
    /// destination directory.
    pub fn dest_path(&self, source: &Path) -> PathBuf {
        let rel = source.strip_prefix(&self.source_dir).unwrap_or(source);
        self.dest_dir.join(rel)
    }

    fn relative_name(&self, path: &Path) -> String {
        let rel = path.strip_prefix(&self.root).unwrap_or(path);
        rel.to_string_lossy().replace('\\', "/")
    }

    /// Run one pass over `sources`.
    ///
    /// Sources that disappeared since the last completed pass have their
    /// outputs deleted. The token is checked between files; a cancelled pass
    /// returns `Cancelled` and the next pass starts over.
    pub async fn compile(
        &mut self,
        sources: &[PathBuf],
        token: &CancellationToken,
    ) -> Result<CompileSummary> {
        let mut summary = CompileSummary::default();
        let current: BTreeSet<PathBuf> = sources.iter().cloned().collect();

        let removed: Vec<PathBuf> = self.known_sources.difference(&current).cloned().collect();
        for source in removed {
            token.check()?;
            if self.remove_outputs(&source).await? {
                summary.removed += 1;
            }
        }

        for source in &current {
            token.check()?;
            self.compile_one(source, &mut summary).await?;
        }

        if let Err(e) = self.files.flush_writes().await {
            warn!(error = %e, "could not flush file cache; entries stay queued");
        }

        self.known_sources = current;
        info!(
            hits = summary.hits,
            misses = summary.misses,
            written = summary.written,
            removed = summary.removed,
            "compile pass finished"
        );
        Ok(summary)
    }

    async fn compile_one(&self, source: &Path, summary: &mut CompileSummary) -> Result<()> {
        let contents = tokio::fs::read(source)
            .await
            .with_context(|| format!("reading source {}", source.display()))?;
        let key = FileCacheKey::new(self.relative_name(source), content_hash(&contents));
        let dest = self.dest_path(source);

        summary.watch.insert(source.to_path_buf());

        let cached = self.files.get_file(&key).await?;
        if let Some(value) = cached.filter(|v| v.transformed_text.is_some()) {
            summary.hits += 1;
            debug!(file = %key.filename, "file cache hit");

            let text = value.transformed_text.as_deref().unwrap_or_default();
            if write_if_changed(&dest, text).await? {
                summary.written += 1;
            }
            // Sidecars are restored on their own; the main output may be intact.
            let sidecars = [("map", &value.map_text), ("decl", &value.definition_text)];
            for (suffix, recorded) in sidecars {
                if let Some(recorded) = recorded {
                    if write_if_changed(&sibling(&dest, suffix), recorded).await? {
                        summary.written += 1;
                    }
                }
            }
            summary
                .watch
                .extend(value.dependencies.iter().map(|d| self.root.join(d)));
            return Ok(());
        }

        summary.misses += 1;
        debug!(file = %key.filename, "file cache miss; transforming");

        let output = self
            .transform
            .transform(source, &contents)
            .await
            .with_context(|| format!("transforming {}", key.filename))?;

        write_file(&dest, &output.text).await?;
        summary.written += 1;
        if let Some(map) = &output.map {
            write_file(&sibling(&dest, "map"), map).await?;
        }
        if let Some(decl) = &output.definition {
            write_file(&sibling(&dest, "decl"), decl).await?;
        }
        summary
            .watch
            .extend(output.dependencies.iter().map(|d| self.root.join(d)));

        self.files.set_file(
            &key,
            &FileCacheValue {
                transformed_text: Some(output.text),
                map_text: output.map,
                definition_text: output.definition,
                dependencies: output.dependencies,
            },
        )?;
        Ok(())
    }

    async fn remove_outputs(&self, source: &Path) -> Result<bool> {
        let dest = self.dest_path(source);
        let mut removed = false;
        for path in [dest.clone(), sibling(&dest, "map"), sibling(&dest, "decl")] {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    removed = true;
                    debug!(path = %path.display(), "removed output of deleted source");
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(removed)
    }
}

fn sibling(dest: &Path, suffix: &str) -> PathBuf {
    let mut s = dest.as_os_str().to_os_string();
    s.push(".");
    s.push(suffix);
    PathBuf::from(s)
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

/// Returns `true` if the file was written.
async fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    match tokio::fs::read_to_string(path).await {
        Ok(existing) if existing == contents => Ok(false),
        _ => {
            write_file(path, contents).await?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::TieredCache;

    struct Upper {
        calls: Arc<AtomicUsize>,
    }

    impl Transform for Upper {
        fn transform<'a>(&'a self, _source: &'a Path, contents: &'a [u8]) -> TransformFuture<'a> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                Ok(TransformOutput {
                    text: String::from_utf8_lossy(contents).to_uppercase(),
                    map: Some("map".into()),
                    definition: None,
                    dependencies: vec!["src/shared.txt".into()],
                })
            })
        }
    }

    fn setup() -> (tempfile::TempDir, IncrementalCompiler<Upper>, Arc<AtomicUsize>) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        std::fs::create_dir_all(root.join("src")).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let files = IncrementalFileCache::new(Arc::new(TieredCache::volatile_only()));
        let compiler = IncrementalCompiler::new(
            &root,
            root.join("src"),
            root.join("dist"),
            files,
            Upper { calls: calls.clone() },
        );
        (dir, compiler, calls)
    }

    #[tokio::test]
    async fn second_pass_hits_and_rewrites_only_missing_outputs() {
        let (dir, mut compiler, calls) = setup();
        let src = dir.path().join("src/a.txt");
        std::fs::write(&src, "hello").unwrap();
        let token = CancellationToken::new();

        let first = compiler.compile(&[src.clone()], &token).await.unwrap();
        assert_eq!((first.hits, first.misses, first.written), (0, 1, 1));
        assert!(first.watch.contains(&dir.path().join("src/shared.txt")));

        let second = compiler.compile(&[src.clone()], &token).await.unwrap();
        assert_eq!((second.hits, second.misses, second.written), (1, 0, 0));

        std::fs::remove_file(dir.path().join("dist/a.txt")).unwrap();
        let third = compiler.compile(&[src.clone()], &token).await.unwrap();
        assert_eq!((third.hits, third.written), (1, 1));
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.txt")).unwrap(), "HELLO");
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.txt.map")).unwrap(), "map");

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn hit_restores_deleted_source_map() {
        let (dir, mut compiler, calls) = setup();
        let src = dir.path().join("src/a.txt");
        std::fs::write(&src, "hello").unwrap();
        let token = CancellationToken::new();

        compiler.compile(&[src.clone()], &token).await.unwrap();
        std::fs::remove_file(dir.path().join("dist/a.txt.map")).unwrap();

        let again = compiler.compile(&[src.clone()], &token).await.unwrap();
        assert_eq!((again.hits, again.misses, again.written), (1, 0, 1));
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.txt.map")).unwrap(), "map");
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.txt")).unwrap(), "HELLO");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn changed_contents_miss() {
        let (dir, mut compiler, calls) = setup();
        let src = dir.path().join("src/a.txt");
        let token = CancellationToken::new();

        std::fs::write(&src, "one").unwrap();
        compiler.compile(&[src.clone()], &token).await.unwrap();
        std::fs::write(&src, "two").unwrap();
        let summary = compiler.compile(&[src.clone()], &token).await.unwrap();

        assert_eq!(summary.misses, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("dist/a.txt")).unwrap(), "TWO");
    }

    #[tokio::test]
    async fn removed_sources_lose_their_outputs() {
        let (dir, mut compiler, _) = setup();
        let a = dir.path().join("src/a.txt");
        let b = dir.path().join("src/b.txt");
        std::fs::write(&a, "a").unwrap();
        std::fs::write(&b, "b").unwrap();
        let token = CancellationToken::new();

        compiler.compile(&[a.clone(), b.clone()], &token).await.unwrap();
        std::fs::remove_file(&b).unwrap();
        let summary = compiler.compile(&[a.clone()], &token).await.unwrap();

        assert_eq!(summary.removed, 1);
        assert!(!dir.path().join("dist/b.txt").exists());
        assert!(!dir.path().join("dist/b.txt.map").exists());
        assert!(dir.path().join("dist/a.txt").exists());
    }

    #[tokio::test]
    async fn cancelled_pass_processes_nothing() {
        let (dir, mut compiler, calls) = setup();
        let src = dir.path().join("src/a.txt");
        std::fs::write(&src, "x").unwrap();
        let token = CancellationToken::new();
        token.cancel();

        let err = compiler.compile(&[src], &token).await.unwrap_err();
        assert!(matches!(err, crate::errors::HammerpackError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!dir.path().join("dist/a.txt").exists());
    }
}
