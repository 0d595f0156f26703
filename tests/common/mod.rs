//! Shared fixtures: throwaway repositories with controlled commit dates
#![allow(dead_code)]

use git2::{IndexAddOption, Oid, Repository, Signature, Time};
use git_revision_date::git::{
    CommitTimestampResolver, FailurePolicy, IgnoreList, RepositoryCache, ResolveOptions,
};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

/// Install a test-writer subscriber once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// In-memory sink for formatted log lines.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run `f` with a thread-local subscriber and return everything it logged.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .without_time()
        .finish();
    let value = tracing::subscriber::with_default(subscriber, f);
    let bytes = buffer.0.lock().unwrap().clone();
    (value, String::from_utf8_lossy(&bytes).into_owned())
}

/// Repository cache that never sees CI variables.
pub fn quiet_cache() -> Arc<RepositoryCache> {
    Arc::new(RepositoryCache::with_env(Arc::new(|_: &str| None)))
}

pub fn resolver(
    repos: Arc<RepositoryCache>,
    ignored: Vec<String>,
    follow_renames: bool,
    fallback_to_build_date: bool,
) -> CommitTimestampResolver {
    CommitTimestampResolver::new(
        repos,
        Arc::new(IgnoreList::new(ignored)),
        ResolveOptions {
            follow_renames,
            policy: FailurePolicy {
                fallback_to_build_date,
                strict: true,
            },
        },
    )
}

/// A git repository in a temp directory, built with libgit2.
pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> anyhow::Result<Self> {
        let dir = tempfile::tempdir()?;
        let repo = Repository::init(dir.path())?;
        {
            let mut config = repo.config()?;
            config.set_str("user.name", "Test User")?;
            config.set_str("user.email", "test@example.com")?;
            config.set_bool("commit.gpgsign", false)?;
        }
        Ok(Self { dir, repo })
    }

    /// Canonical root, matching what discovery reports.
    pub fn root(&self) -> PathBuf {
        fs::canonicalize(self.dir.path()).unwrap_or_else(|_| self.dir.path().to_path_buf())
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> anyhow::Result<PathBuf> {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, content)?;
        Ok(path)
    }

    pub fn rename(&self, from: &str, to: &str) -> anyhow::Result<PathBuf> {
        let target = self.path(to);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(self.path(from), &target)?;
        Ok(target)
    }

    /// Stage everything (including deletions) and commit at `timestamp`.
    pub fn commit_all(&self, message: &str, timestamp: i64) -> anyhow::Result<Oid> {
        let mut index = self.repo.index()?;
        index.add_all(["*"].iter(), IndexAddOption::DEFAULT, None)?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let sig = Signature::new("Test User", "test@example.com", &Time::new(timestamp, 0))?;
        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(_) => None,
        };
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        Ok(self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?)
    }

    pub fn tag(&self, name: &str, oid: Oid) -> anyhow::Result<()> {
        let target = self.repo.find_object(oid, None)?;
        self.repo.tag_lightweight(name, &target, false)?;
        Ok(())
    }
}

/// Run the git CLI, panicking with stderr on failure.
pub fn git_command(cwd: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(cwd)
        .args(args)
        .output()
        .unwrap_or_else(|_| panic!("failed to run git {:?}", args));

    if !output.status.success() {
        panic!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
    }

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}
