//! Build-scoped revision date resolution
//!
//! A [`RevisionSession`] lives for one build:
//! 1. Load the ignore list (if configured)
//! 2. Prefetch last-change (and optionally creation) timestamps for every
//!    source file on the worker pool
//! 3. Answer per-page lookups from the memo table, resolving misses serially
//!
//! Each build gets a fresh session, so long-running watch processes never
//! see stale history.

pub mod parallel;

pub use parallel::{resolve_all, resolve_jobs, worker_count, ResolveJob, MAX_WORKERS};

use crate::config::{ExcludeMatcher, RevisionDateConfig};
use crate::error::GitResult;
use crate::git::{
    tag_for, CommitTimestampResolver, IgnoreList, QueryKind, RepositoryCache, ResolvedTimestamp,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// A source file handed over by the site build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Location on disk
    pub abs_path: PathBuf,
    /// Path relative to the docs directory, matched against exclude globs
    pub src_path: PathBuf,
    /// Produced by the build itself, so it has no git history
    pub generated: bool,
}

impl SourceFile {
    pub fn new(abs_path: impl Into<PathBuf>, src_path: impl Into<PathBuf>) -> Self {
        Self {
            abs_path: abs_path.into(),
            src_path: src_path.into(),
            generated: false,
        }
    }

    pub fn generated(abs_path: impl Into<PathBuf>, src_path: impl Into<PathBuf>) -> Self {
        Self {
            generated: true,
            ..Self::new(abs_path, src_path)
        }
    }
}

/// Revision metadata for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRevision {
    pub last_update: ResolvedTimestamp,
    /// Tag pointing at the last update commit, empty if none
    pub last_update_tag: String,
    /// Only present when creation dates are enabled
    pub created: Option<ResolvedTimestamp>,
    pub created_tag: String,
}

/// Write-once memo of resolved timestamps, keyed by absolute path and query.
#[derive(Debug, Default)]
pub struct MemoTable {
    entries: DashMap<(PathBuf, QueryKind), ResolvedTimestamp>,
}

impl MemoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path, kind: QueryKind) -> Option<ResolvedTimestamp> {
        self.entries
            .get(&(path.to_path_buf(), kind))
            .map(|e| e.value().clone())
    }

    pub fn contains(&self, path: &Path, kind: QueryKind) -> bool {
        self.entries.contains_key(&(path.to_path_buf(), kind))
    }

    /// Store `value` unless the key is already populated; returns the stored value.
    pub fn insert_once(
        &self,
        path: PathBuf,
        kind: QueryKind,
        value: ResolvedTimestamp,
    ) -> ResolvedTimestamp {
        self.entries
            .entry((path, kind))
            .or_insert(value)
            .value()
            .clone()
    }

    /// Number of entries for `kind`.
    pub fn count(&self, kind: QueryKind) -> usize {
        self.entries.iter().filter(|e| e.key().1 == kind).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Revision date resolution for one build.
pub struct RevisionSession {
    config: RevisionDateConfig,
    resolver: CommitTimestampResolver,
    exclude: ExcludeMatcher,
    memo: MemoTable,
}

impl RevisionSession {
    /// Session with a fresh repository cache reading the process environment.
    ///
    /// `config_dir` anchors a relative `ignored_commits_file`.
    pub fn new(config: RevisionDateConfig, config_dir: &Path) -> Self {
        Self::with_repositories(config, config_dir, Arc::new(RepositoryCache::new()))
    }

    pub fn with_repositories(
        config: RevisionDateConfig,
        config_dir: &Path,
        repos: Arc<RepositoryCache>,
    ) -> Self {
        let ignored = match config.ignored_commits_path(config_dir) {
            Some(path) => IgnoreList::load(&path),
            None => IgnoreList::default(),
        };
        let resolver =
            CommitTimestampResolver::new(repos, Arc::new(ignored), config.resolve_options());

        Self {
            exclude: ExcludeMatcher::new(&config.exclude),
            config,
            resolver,
            memo: MemoTable::new(),
        }
    }

    pub fn config(&self) -> &RevisionDateConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CommitTimestampResolver {
        &self.resolver
    }

    pub fn memo(&self) -> &MemoTable {
        &self.memo
    }

    /// Whether `file` is never resolved (generated, or matched by `exclude`).
    pub fn is_skipped(&self, file: &SourceFile) -> bool {
        file.generated || self.exclude.is_excluded(&file.src_path)
    }

    /// Resolve every eligible file on the worker pool and memoize the results.
    ///
    /// `original_source` maps a build path to the file it was copied from;
    /// git is queried at the original while results stay keyed by the build
    /// path. Does nothing when parallel processing is disabled.
    pub fn prefetch(
        &self,
        files: &[SourceFile],
        original_source: Option<&HashMap<PathBuf, PathBuf>>,
    ) -> GitResult<()> {
        if !self.config.enabled || !self.config.enable_parallel_processing {
            return Ok(());
        }

        let jobs: Vec<ResolveJob> = files
            .iter()
            .filter(|file| !self.is_skipped(file))
            .map(|file| {
                let key = absolute(&file.abs_path);
                let source = original_source
                    .and_then(|map| map.get(&file.abs_path))
                    .map(|p| absolute(p))
                    .unwrap_or_else(|| key.clone());
                ResolveJob { key, source }
            })
            .collect();

        self.prefetch_kind(&jobs, QueryKind::LastChange)?;
        if self.config.enable_creation_date {
            self.prefetch_kind(&jobs, QueryKind::Creation)?;
        }
        Ok(())
    }

    fn prefetch_kind(&self, jobs: &[ResolveJob], kind: QueryKind) -> GitResult<()> {
        let pending: Vec<ResolveJob> = jobs
            .iter()
            .filter(|job| !self.memo.contains(&job.key, kind))
            .cloned()
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let resolved = resolve_jobs(&self.resolver, pending, kind, self.config.max_workers)?;
        for (path, ts) in resolved {
            self.memo.insert_once(path, kind, ts);
        }
        Ok(())
    }

    /// Memoized lookup; resolves (and stores) on a miss.
    pub fn resolve(&self, path: &Path, kind: QueryKind) -> GitResult<ResolvedTimestamp> {
        let key = absolute(path);
        if let Some(hit) = self.memo.get(&key, kind) {
            return Ok(hit);
        }
        debug!("Memo miss for {:?} of {}", kind, key.display());
        let ts = self.resolver.resolve(&key, kind)?;
        Ok(self.memo.insert_once(key, kind, ts))
    }

    /// Last relevant change anywhere under `docs_dir`.
    pub fn site_revision(&self, docs_dir: &Path) -> GitResult<ResolvedTimestamp> {
        if !self.config.enabled {
            return Ok(ResolvedTimestamp::fallback());
        }
        self.resolve(docs_dir, QueryKind::LastChange)
    }

    /// Revision metadata for a page, or `None` when disabled or excluded.
    ///
    /// A creation date later than the last update (a known artefact of
    /// rename following) is clamped to the last update.
    pub fn page_revision(&self, file: &SourceFile) -> GitResult<Option<PageRevision>> {
        if !self.config.enabled {
            return Ok(None);
        }
        if self.exclude.is_excluded(&file.src_path) {
            debug!("Excluding page {}", file.src_path.display());
            return Ok(None);
        }

        let last_update = if file.generated {
            ResolvedTimestamp::fallback()
        } else {
            self.resolve(&file.abs_path, QueryKind::LastChange)?
        };

        let created = if !self.config.enable_creation_date {
            None
        } else if file.generated {
            Some(ResolvedTimestamp::fallback())
        } else {
            let created = self.resolve(&file.abs_path, QueryKind::Creation)?;
            Some(reconcile(file, created, &last_update))
        };

        let repos = self.resolver.repositories();
        Ok(Some(PageRevision {
            last_update_tag: tag_for(repos, &last_update.commit_hash),
            created_tag: created
                .as_ref()
                .map(|c| tag_for(repos, &c.commit_hash))
                .unwrap_or_default(),
            last_update,
            created,
        }))
    }

    /// Tag pointing at `commit_hash` in any repository seen this build.
    pub fn tag_for(&self, commit_hash: &str) -> String {
        tag_for(self.resolver.repositories(), commit_hash)
    }
}

fn reconcile(
    file: &SourceFile,
    created: ResolvedTimestamp,
    last_update: &ResolvedTimestamp,
) -> ResolvedTimestamp {
    if created.timestamp <= last_update.timestamp {
        return created;
    }
    warn!(
        "First revision timestamp is newer than last revision timestamp for page {}. \
         This can be due to a quirk in `git` follow behaviour. \
         You can try to set `enable_git_follow: false` in the plugin configuration.",
        file.src_path.display()
    );
    last_update.clone()
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memo_insert_once() {
        let memo = MemoTable::new();
        let path = PathBuf::from("/docs/a.md");
        let first = memo.insert_once(
            path.clone(),
            QueryKind::LastChange,
            ResolvedTimestamp::new("aaa", 10),
        );
        let second = memo.insert_once(
            path.clone(),
            QueryKind::LastChange,
            ResolvedTimestamp::new("bbb", 20),
        );
        assert_eq!(first, second);
        assert_eq!(memo.get(&path, QueryKind::LastChange).unwrap().commit_hash, "aaa");
        assert!(memo.get(&path, QueryKind::Creation).is_none());
        assert_eq!(memo.count(QueryKind::LastChange), 1);
        assert_eq!(memo.len(), 1);
    }

    #[test]
    fn test_reconcile_clamps_creation() {
        let file = SourceFile::new("/docs/a.md", "a.md");
        let last = ResolvedTimestamp::new("last", 100);

        let ok = reconcile(&file, ResolvedTimestamp::new("first", 50), &last);
        assert_eq!(ok.commit_hash, "first");

        let clamped = reconcile(&file, ResolvedTimestamp::new("first", 150), &last);
        assert_eq!(clamped, last);
    }

    #[test]
    fn test_disabled_session_returns_nothing() -> anyhow::Result<()> {
        let config = RevisionDateConfig {
            enabled: false,
            ..Default::default()
        };
        let session = RevisionSession::new(config, Path::new("."));
        let file = SourceFile::new("/nowhere/a.md", "a.md");
        assert!(session.page_revision(&file)?.is_none());
        session.prefetch(&[file], None)?;
        assert!(session.memo().is_empty());
        Ok(())
    }

    #[test]
    fn test_generated_and_excluded_files_are_skipped() -> anyhow::Result<()> {
        let config = RevisionDateConfig {
            exclude: vec!["drafts/*".to_string()],
            enable_creation_date: true,
            ..Default::default()
        };
        let session = RevisionSession::new(config, Path::new("."));

        let generated = SourceFile::generated("/nowhere/gen.md", "gen.md");
        let excluded = SourceFile::new("/nowhere/drafts/a.md", "drafts/a.md");
        assert!(session.is_skipped(&generated));
        assert!(session.is_skipped(&excluded));

        // Neither path is in a repository, yet nothing fails: they are never queried
        session.prefetch(&[generated.clone(), excluded.clone()], None)?;
        assert!(session.memo().is_empty());

        let page = session.page_revision(&generated)?.expect("generated pages get dates");
        assert!(page.last_update.is_fallback());
        assert!(page.created.expect("creation enabled").is_fallback());
        assert!(session.page_revision(&excluded)?.is_none());
        Ok(())
    }
}
