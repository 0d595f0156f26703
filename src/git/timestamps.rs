//! Per-file commit timestamp resolution
//!
//! Answers two questions about a path:
//!
//! - **last change**: the newest commit touching the path whose hash is not on
//!   the ignore list
//! - **creation**: the oldest commit that introduced the path
//!
//! Both follow renames when enabled. The ignore list only applies to the last
//! change query; an ignored commit may hide an update, never a file's origin.

use crate::error::GitResult;
use crate::git::ignore_revs::IgnoreList;
use crate::git::policy::FailurePolicy;
use crate::git::repository::RepositoryCache;
use chrono::Utc;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Which commit of a path's history is being asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    LastChange,
    Creation,
}

impl QueryKind {
    pub fn is_first_commit(self) -> bool {
        matches!(self, QueryKind::Creation)
    }
}

/// A commit hash and its author time in unix seconds.
///
/// An empty hash marks a synthetic fallback (the resolution time) rather than
/// a date read from history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedTimestamp {
    pub commit_hash: String,
    pub timestamp: i64,
}

impl ResolvedTimestamp {
    pub fn new(commit_hash: impl Into<String>, timestamp: i64) -> Self {
        Self {
            commit_hash: commit_hash.into(),
            timestamp: timestamp.max(0),
        }
    }

    /// `("", now)`
    pub fn fallback() -> Self {
        Self::new("", Utc::now().timestamp())
    }

    pub fn is_fallback(&self) -> bool {
        self.commit_hash.is_empty()
    }
}

/// Resolver options that shape the git queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub follow_renames: bool,
    pub policy: FailurePolicy,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            follow_renames: true,
            policy: FailurePolicy::default(),
        }
    }
}

/// Resolves commit timestamps through a shared [`RepositoryCache`].
pub struct CommitTimestampResolver {
    repos: Arc<RepositoryCache>,
    ignored: Arc<IgnoreList>,
    options: ResolveOptions,
}

impl CommitTimestampResolver {
    pub fn new(
        repos: Arc<RepositoryCache>,
        ignored: Arc<IgnoreList>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            repos,
            ignored,
            options,
        }
    }

    pub fn repositories(&self) -> &Arc<RepositoryCache> {
        &self.repos
    }

    /// Resolve `path` for the given query.
    ///
    /// Empty history yields the fallback pair. Failures follow the configured
    /// [`FailurePolicy`]: either the fallback pair or the error, naming `path`.
    pub fn resolve(&self, path: &Path, kind: QueryKind) -> GitResult<ResolvedTimestamp> {
        let policy = self.options.policy;
        let mut n_ignored = 0;

        let found = match kind {
            QueryKind::Creation => self.query_creation(path),
            QueryKind::LastChange => self.query_last_change(path, &mut n_ignored),
        };

        match found {
            Ok(Some(resolved)) => Ok(resolved),
            Ok(None) => {
                let mut msg = format!(
                    "[git-revision-date] '{}' has no git logs, using current timestamp",
                    path.display()
                );
                if n_ignored > 0 {
                    msg.push_str(&format!(" (ignored {} commits)", n_ignored));
                }
                policy.soft_log(&msg);
                Ok(ResolvedTimestamp::fallback())
            }
            Err(err) => policy.recover(err),
        }
    }

    fn query_last_change(
        &self,
        path: &Path,
        n_ignored: &mut usize,
    ) -> GitResult<Option<ResolvedTimestamp>> {
        let realpath = realpath(path);
        let handle = self.repos.resolve(&realpath)?;

        // One more entry than there are ignored commits is always enough to
        // reach a commit that is not ignored, if one exists.
        let limit = (self.ignored.len() + 1).to_string();
        let mut args: Vec<&OsStr> = [
            "log",
            "--format=%H %at",
            "-n",
            limit.as_str(),
            "--no-show-signature",
            "--ignore-all-space",
            "--ignore-blank-lines",
            "--diff-filter=r",
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();
        if self.options.follow_renames {
            args.push(OsStr::new("--follow"));
        }
        args.push(OsStr::new("--"));
        args.push(realpath.as_os_str());

        let stdout = handle.git(&args, path)?;
        let commits = parse_log_lines(&stdout, path)?;

        for commit in commits {
            if self.ignored.is_ignored(&commit.commit_hash) {
                *n_ignored += 1;
                continue;
            }
            if *n_ignored > 0 {
                debug!(
                    "Skipped {} ignored commit(s) for {}",
                    n_ignored,
                    path.display()
                );
            }
            return Ok(Some(commit));
        }
        Ok(None)
    }

    fn query_creation(&self, path: &Path) -> GitResult<Option<ResolvedTimestamp>> {
        let realpath = realpath(path);
        let handle = self.repos.resolve(&realpath)?;

        // "A" selects commits that added the path; "r" drops the rename
        // commits that --follow would otherwise report as the introduction.
        let mut args: Vec<&OsStr> = [
            "log",
            "--format=%H %at",
            "--diff-filter=Ar",
            "--no-show-signature",
        ]
        .into_iter()
        .map(OsStr::new)
        .collect();
        if self.options.follow_renames {
            args.push(OsStr::new("--follow"));
        }
        args.push(OsStr::new("--"));
        args.push(realpath.as_os_str());

        let stdout = handle.git(&args, path)?;
        // A path can be added more than once; newest first, so the oldest is last
        Ok(parse_log_lines(&stdout, path)?.pop())
    }
}

fn realpath(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Parse `git log --format="%H %at"` output, newest first.
fn parse_log_lines(stdout: &str, path: &Path) -> GitResult<Vec<ResolvedTimestamp>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| parse_log_line(line, path))
        .collect()
}

fn parse_log_line(line: &str, path: &Path) -> GitResult<ResolvedTimestamp> {
    let unexpected = |message: String| crate::error::GitHistoryError::UnexpectedFailure {
        path: path.to_path_buf(),
        message,
    };

    let (hash, ts) = line
        .split_once(' ')
        .ok_or_else(|| unexpected(format!("malformed git log line '{}'", line)))?;
    let timestamp = ts
        .trim()
        .parse::<i64>()
        .map_err(|e| unexpected(format!("invalid commit timestamp '{}': {}", ts, e)))?;

    Ok(ResolvedTimestamp::new(hash, timestamp))
}
