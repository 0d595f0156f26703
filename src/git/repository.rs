//! Repository discovery and the per-root handle cache
//!
//! Paths are mapped to the root of the repository that contains them by
//! searching upward through parent directories. One [`RepositoryHandle`] is
//! kept per distinct root for the lifetime of the cache; concurrent callers
//! racing on the same root end up sharing whichever handle was inserted first.
//!
//! A directory below an already opened root reuses that root without another
//! discovery, unless a nested `.git` sits in between.

use crate::error::{GitHistoryError, GitResult};
use crate::git::ci::{self, EnvLookup};
use crate::git::command::git_at;
use dashmap::DashMap;
use git2::{ErrorCode, Oid, Repository};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// Read-only query capability bound to one repository root.
pub struct RepositoryHandle {
    root: PathBuf,
    repo: Mutex<Repository>,
}

impl RepositoryHandle {
    fn new(root: PathBuf, repo: Repository) -> Self {
        Self {
            root,
            repo: Mutex::new(repo),
        }
    }

    /// Top-level directory of the working tree (the git dir for bare repos).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a `git` subcommand inside this repository.
    pub fn git<I, S>(&self, args: I, subject: &Path) -> GitResult<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        git_at(&self.root, args, subject)
    }

    fn lock(&self) -> MutexGuard<'_, Repository> {
        self.repo.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the repository only holds a truncated suffix of its history.
    pub fn is_shallow(&self) -> bool {
        self.lock().is_shallow()
    }

    /// Number of commits reachable from the current position.
    ///
    /// This is the maximum, over HEAD and every reference, of the first-parent
    /// chain length. A shallow fetch may still expose a longer chain on some
    /// branch than on the checked out one.
    pub fn commit_count(&self) -> Result<usize, git2::Error> {
        let repo = self.lock();

        let mut tips: Vec<Oid> = Vec::new();
        if let Ok(head) = repo.head().and_then(|h| h.peel_to_commit()) {
            tips.push(head.id());
        }
        for reference in repo.references()? {
            let reference = reference?;
            if let Ok(commit) = reference.peel_to_commit() {
                tips.push(commit.id());
            }
        }

        let mut seen = HashSet::new();
        let mut max = 0;
        for tip in tips {
            if !seen.insert(tip) {
                continue;
            }
            let mut walk = repo.revwalk()?;
            walk.simplify_first_parent()?;
            walk.push(tip)?;
            max = max.max(walk.filter_map(Result::ok).count());
        }
        Ok(max)
    }
}

impl std::fmt::Debug for RepositoryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryHandle")
            .field("root", &self.root)
            .finish()
    }
}

/// Thread-safe registry of repository handles, keyed by normalized root.
pub struct RepositoryCache {
    /// Search directory -> discovered root
    roots: DashMap<PathBuf, PathBuf>,
    /// Root -> handle
    handles: DashMap<PathBuf, Arc<RepositoryHandle>>,
    /// Handles in the order their roots were first opened
    opened: Mutex<Vec<Arc<RepositoryHandle>>>,
    discoveries: AtomicUsize,
    env: EnvLookup,
}

impl Default for RepositoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RepositoryCache {
    /// Cache whose CI diagnostics read the process environment.
    pub fn new() -> Self {
        Self::with_env(ci::process_env())
    }

    /// Cache whose CI diagnostics read variables from `env`.
    pub fn with_env(env: EnvLookup) -> Self {
        Self {
            roots: DashMap::new(),
            handles: DashMap::new(),
            opened: Mutex::new(Vec::new()),
            discoveries: AtomicUsize::new(0),
            env,
        }
    }

    /// Find (or reuse) the handle for the repository containing `path`.
    ///
    /// `path` may be a file or a directory; for files the search starts at the
    /// containing directory.
    pub fn resolve(&self, path: &Path) -> GitResult<Arc<RepositoryHandle>> {
        let dir = search_start(path);

        if let Some(root) = self.roots.get(&dir).map(|r| r.clone()) {
            if let Some(handle) = self.handles.get(&root) {
                return Ok(Arc::clone(&handle));
            }
        }
        if let Some(handle) = self.enclosing_handle(&dir) {
            self.roots.insert(dir, handle.root().to_path_buf());
            return Ok(handle);
        }

        self.discoveries.fetch_add(1, Ordering::Relaxed);
        let repo = Repository::discover(&dir).map_err(|e| discover_error(path, e))?;
        let root = repo_root(&repo);

        let mut created = false;
        let handle = Arc::clone(
            &self
                .handles
                .entry(root.clone())
                .or_insert_with(|| {
                    created = true;
                    Arc::new(RepositoryHandle::new(root.clone(), repo))
                }),
        );
        self.roots.insert(dir, root);

        if created {
            self.lock_opened().push(Arc::clone(&handle));
            debug!("Opened git repository at {}", handle.root().display());
            ci::check_with(&handle, self.env.as_ref());
        }

        Ok(handle)
    }

    /// Nearest opened root at or above `dir`, stopping at any unknown `.git`.
    fn enclosing_handle(&self, dir: &Path) -> Option<Arc<RepositoryHandle>> {
        for ancestor in dir.ancestors() {
            if let Some(handle) = self.handles.get(ancestor) {
                return Some(Arc::clone(&handle));
            }
            if ancestor.join(".git").exists() {
                return None;
            }
        }
        None
    }

    fn lock_opened(&self) -> MutexGuard<'_, Vec<Arc<RepositoryHandle>>> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every handle opened so far, oldest first.
    pub fn handles(&self) -> Vec<Arc<RepositoryHandle>> {
        self.lock_opened().clone()
    }

    /// Number of distinct repository roots seen.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// How many times an upward root search actually ran.
    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::Relaxed)
    }
}

/// Classify a failed discovery.
///
/// libgit2 checks directory ownership itself (`safe.directory`); that refusal
/// is reported like git's own "dubious ownership" error rather than as a
/// missing repository, so it is never replaced by a fallback date.
fn discover_error(path: &Path, err: git2::Error) -> GitHistoryError {
    if err.code() == ErrorCode::Owner {
        return GitHistoryError::QueryExecutionFailed {
            path: path.to_path_buf(),
            stderr: format!(
                "detected dubious ownership in repository: {} \
                 (add it to git's safe.directory)",
                err.message()
            ),
        };
    }
    GitHistoryError::RepositoryNotFound {
        path: path.to_path_buf(),
        reason: err.message().to_string(),
    }
}

fn search_start(path: &Path) -> PathBuf {
    let dir = if path.is_dir() {
        path
    } else {
        path.parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    };
    std::fs::canonicalize(dir).unwrap_or_else(|_| dir.to_path_buf())
}

fn repo_root(repo: &Repository) -> PathBuf {
    let root = repo.workdir().unwrap_or_else(|| repo.path());
    // libgit2 reports the workdir with a trailing separator
    let root: PathBuf = root.components().collect();
    std::fs::canonicalize(&root).unwrap_or(root)
}
