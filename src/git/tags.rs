//! Tag lookup for resolved commits

use crate::git::repository::RepositoryCache;
use std::path::Path;
use tracing::debug;

/// Name of a tag pointing exactly at `commit_hash`, or an empty string.
///
/// Every repository opened so far is searched, in the order the repositories
/// were first opened. Within one repository, when several tags point at the
/// commit, the first in git's default (refname) order wins. Query errors are
/// skipped so this stays best-effort.
pub fn tag_for(repos: &RepositoryCache, commit_hash: &str) -> String {
    if commit_hash.is_empty() {
        return String::new();
    }

    for handle in repos.handles() {
        let args = [
            "tag",
            "--points-at",
            commit_hash,
            "--format=%(refname:short)",
        ];
        match handle.git(&args, Path::new(commit_hash)) {
            Ok(stdout) => {
                if let Some(tag) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) {
                    return tag.to_string();
                }
            }
            Err(e) => {
                debug!(
                    "Tag lookup for {} failed in {}: {}",
                    commit_hash,
                    handle.root().display(),
                    e
                );
            }
        }
    }

    String::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature, Time};
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn test_tagged_and_untagged_commits() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let repo = Repository::init(dir.path())?;
        let sig = Signature::new("Test User", "test@example.com", &Time::new(1500854705, 0))?;
        let tree_id = repo.index()?.write_tree()?;
        let tree = repo.find_tree(tree_id)?;
        let first = repo.commit(Some("HEAD"), &sig, &sig, "first", &tree, &[])?;
        let parent = repo.find_commit(first)?;
        let second = repo.commit(Some("HEAD"), &sig, &sig, "second", &tree, &[&parent])?;

        let target = repo.find_object(first, None)?;
        repo.tag_lightweight("v1.0", &target, false)?;
        repo.tag_lightweight("a-release", &target, false)?;

        let cache = RepositoryCache::with_env(Arc::new(|_: &str| None));
        cache.resolve(dir.path())?;

        assert_eq!(tag_for(&cache, &first.to_string()), "a-release");
        assert_eq!(tag_for(&cache, &second.to_string()), "");
        Ok(())
    }

    #[test]
    fn test_empty_and_unknown_hash() -> anyhow::Result<()> {
        let dir = tempdir()?;
        Repository::init(dir.path())?;
        let cache = RepositoryCache::with_env(Arc::new(|_: &str| None));
        cache.resolve(dir.path())?;

        assert_eq!(tag_for(&cache, ""), "");
        assert_eq!(tag_for(&cache, "0123456789abcdef0123456789abcdef01234567"), "");
        Ok(())
    }

    /// Same author, time, message and tree in both repositories, so the same oid.
    fn identical_root_commit(dir: &std::path::Path, tag: &str) -> anyhow::Result<git2::Oid> {
        let repo = Repository::init(dir)?;
        let sig = Signature::new("Test User", "test@example.com", &Time::new(1500854705, 0))?;
        let tree = repo.find_tree(repo.index()?.write_tree()?)?;
        let oid = repo.commit(Some("HEAD"), &sig, &sig, "shared root", &tree, &[])?;
        repo.tag_lightweight(tag, &repo.find_object(oid, None)?, false)?;
        Ok(oid)
    }

    #[test]
    fn test_first_opened_repository_wins() -> anyhow::Result<()> {
        let one = tempdir()?;
        let two = tempdir()?;
        let oid = identical_root_commit(one.path(), "from-one")?;
        assert_eq!(identical_root_commit(two.path(), "from-two")?, oid);

        let cache = RepositoryCache::with_env(Arc::new(|_: &str| None));
        cache.resolve(two.path())?;
        cache.resolve(one.path())?;
        assert_eq!(tag_for(&cache, &oid.to_string()), "from-two");

        let cache = RepositoryCache::with_env(Arc::new(|_: &str| None));
        cache.resolve(one.path())?;
        cache.resolve(two.path())?;
        assert_eq!(tag_for(&cache, &oid.to_string()), "from-one");
        Ok(())
    }
}
