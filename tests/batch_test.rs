//! Batch resolution on the bounded worker pool

mod common;

use common::{quiet_cache, resolver, TestRepo};
use git_revision_date::pipeline::{resolve_all, MAX_WORKERS};
use git_revision_date::{FailureKind, QueryKind};
use std::path::PathBuf;

const T1: i64 = 1500854705;
const T2: i64 = 1519964705;

/// More pages than the pool has workers; odd pages are edited at t2.
fn wide_repo() -> anyhow::Result<(TestRepo, Vec<PathBuf>)> {
    let repo = TestRepo::new()?;
    let mut pages = Vec::new();
    for i in 0..(MAX_WORKERS + 5) {
        pages.push(repo.write(&format!("docs/page_{:02}.md", i), &format!("# {}\n", i))?);
    }
    repo.commit_all("add pages", T1)?;
    for i in (1..pages.len()).step_by(2) {
        repo.write(&format!("docs/page_{:02}.md", i), &format!("# {}\n\nEdited.\n", i))?;
    }
    repo.commit_all("edit odd pages", T2)?;
    Ok((repo, pages))
}

#[test]
fn test_resolve_all_covers_every_path() -> anyhow::Result<()> {
    let (_repo, pages) = wide_repo()?;
    let repos = quiet_cache();
    let r = resolver(repos.clone(), vec![], true, false);

    let resolved = resolve_all(&r, &pages, QueryKind::LastChange, None)?;
    assert_eq!(resolved.len(), pages.len());
    for (i, page) in pages.iter().enumerate() {
        let expected = if i % 2 == 1 { T2 } else { T1 };
        assert_eq!(resolved[page].timestamp, expected, "{}", page.display());
    }

    let created = resolve_all(&r, &pages, QueryKind::Creation, Some(3))?;
    assert!(created.values().all(|ts| ts.timestamp == T1));

    assert_eq!(repos.len(), 1);
    assert_eq!(repos.discoveries(), 1);
    Ok(())
}

#[test]
fn test_duplicate_paths_resolve_once_and_agree() -> anyhow::Result<()> {
    let (_repo, pages) = wide_repo()?;
    let r = resolver(quiet_cache(), vec![], true, false);

    let mut batch = pages.clone();
    batch.push(pages[1].clone());
    batch.push(pages[1].clone());
    batch.insert(0, pages[4].clone());

    let resolved = resolve_all(&r, &batch, QueryKind::LastChange, Some(MAX_WORKERS))?;
    assert_eq!(resolved.len(), pages.len());
    assert_eq!(resolved[&pages[1]], r.resolve(&pages[1], QueryKind::LastChange)?);
    assert_eq!(resolved[&pages[4]], r.resolve(&pages[4], QueryKind::LastChange)?);
    Ok(())
}

#[test]
fn test_failure_aborts_the_batch() -> anyhow::Result<()> {
    let (_repo, mut pages) = wide_repo()?;
    let outside = tempfile::tempdir()?;
    let stray = outside.path().join("stray.md");
    std::fs::write(&stray, "outside any repository\n")?;
    pages.insert(3, stray.clone());

    let strict = resolver(quiet_cache(), vec![], true, false);
    let err = resolve_all(&strict, &pages, QueryKind::LastChange, Some(2)).unwrap_err();
    assert_eq!(err.kind(), FailureKind::RepositoryNotFound);
    assert!(err.to_string().contains("stray.md"));

    let lenient = resolver(quiet_cache(), vec![], true, true);
    let resolved = resolve_all(&lenient, &pages, QueryKind::LastChange, Some(2))?;
    assert_eq!(resolved.len(), pages.len());
    assert!(resolved[&stray].is_fallback());
    Ok(())
}

#[test]
fn test_empty_batch() -> anyhow::Result<()> {
    let r = resolver(quiet_cache(), vec![], true, false);
    assert!(resolve_all(&r, &[], QueryKind::LastChange, None)?.is_empty());
    Ok(())
}
