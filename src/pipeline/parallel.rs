//! Bounded worker pool for batch resolution
//!
//! ```text
//!                 ┌─────────────┐
//!                 │  job queue  │  every distinct path, queued up front
//!                 └──────┬──────┘
//!        ┌───────────────┼───────────────┐
//!        ▼               ▼               ▼
//!   ┌──────────┐    ┌──────────┐    ┌──────────┐
//!   │ Worker 1 │    │ Worker 2 │    │ Worker N │  N <= MAX_WORKERS, each
//!   └────┬─────┘    └────┬─────┘    └────┬─────┘  blocked on a git child
//!        └───────────────┼───────────────┘
//!                        ▼
//!                 ┌─────────────┐
//!                 │  collector  │  path -> ResolvedTimestamp
//!                 └─────────────┘
//! ```
//!
//! Each job spawns a `git` process, so the pool size is capped by a constant
//! rather than the core count. The first propagated failure stops workers from
//! picking up further jobs and is returned to the caller.

use crate::error::{GitHistoryError, GitResult};
use crate::git::{CommitTimestampResolver, QueryKind, ResolvedTimestamp};
use crossbeam_channel::unbounded;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::debug;

/// Hard ceiling on concurrent git subprocesses.
pub const MAX_WORKERS: usize = 10;

/// One path to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveJob {
    /// Key the result is stored under
    pub key: PathBuf,
    /// Path actually queried in git (differs from `key` for copied sources)
    pub source: PathBuf,
}

impl ResolveJob {
    pub fn new(path: PathBuf) -> Self {
        Self {
            key: path.clone(),
            source: path,
        }
    }
}

/// Number of workers for `n_jobs` jobs.
///
/// `requested` (or the available parallelism) capped at [`MAX_WORKERS`] and
/// at the job count, never below one.
pub fn worker_count(requested: Option<usize>, n_jobs: usize) -> usize {
    let wanted = requested.unwrap_or_else(|| {
        thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    });
    wanted.min(MAX_WORKERS).min(n_jobs).max(1)
}

/// Resolve every path in `paths` for `kind`.
pub fn resolve_all(
    resolver: &CommitTimestampResolver,
    paths: &[PathBuf],
    kind: QueryKind,
    max_workers: Option<usize>,
) -> GitResult<HashMap<PathBuf, ResolvedTimestamp>> {
    let jobs = paths.iter().cloned().map(ResolveJob::new).collect();
    resolve_jobs(resolver, jobs, kind, max_workers)
}

/// Resolve a batch of jobs on a bounded pool, keyed by [`ResolveJob::key`].
///
/// Jobs with a duplicate key are dropped, so no two workers ever race on the
/// same result.
pub fn resolve_jobs(
    resolver: &CommitTimestampResolver,
    jobs: Vec<ResolveJob>,
    kind: QueryKind,
    max_workers: Option<usize>,
) -> GitResult<HashMap<PathBuf, ResolvedTimestamp>> {
    let mut seen = HashSet::new();
    let jobs: Vec<ResolveJob> = jobs
        .into_iter()
        .filter(|job| seen.insert(job.key.clone()))
        .collect();
    if jobs.is_empty() {
        return Ok(HashMap::new());
    }

    let total = jobs.len();
    let num_workers = worker_count(max_workers, total);
    debug!(
        "Resolving {:?} for {} file(s) on {} worker(s)",
        kind, total, num_workers
    );

    let (job_tx, job_rx) = unbounded::<ResolveJob>();
    for job in jobs {
        // The receiver is alive until the workers finish
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<(PathBuf, GitResult<ResolvedTimestamp>)>();
    let abort = AtomicBool::new(false);

    thread::scope(|scope| {
        for _ in 0..num_workers {
            let rx = job_rx.clone();
            let tx = result_tx.clone();
            let abort = &abort;

            scope.spawn(move || {
                for job in rx {
                    if abort.load(Ordering::Relaxed) {
                        break;
                    }
                    let result = resolver.resolve(&job.source, kind);
                    if result.is_err() {
                        abort.store(true, Ordering::Relaxed);
                    }
                    if tx.send((job.key, result)).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    let mut resolved = HashMap::with_capacity(total);
    let mut first_error: Option<GitHistoryError> = None;
    for (key, result) in result_rx {
        match result {
            Ok(ts) => {
                resolved.insert(key, ts);
            }
            Err(e) => {
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(resolved),
    }
}
