//! Shallow clone diagnostics for CI runners
//!
//! CI providers usually check out a truncated history, which makes every file
//! look like it was last touched by the most recent fetched commit. When the
//! repository is shallow, the known providers are tried in order and the first
//! one whose condition holds emits a remediation warning. Nothing here ever
//! changes control flow.

use crate::git::repository::RepositoryHandle;
use std::sync::Arc;
use tracing::{debug, warn};

/// Environment variable lookup, injectable for tests.
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Lookup backed by the process environment.
pub fn process_env() -> EnvLookup {
    Arc::new(|key: &str| std::env::var(key).ok())
}

/// A CI provider with a known default fetch depth.
pub struct CiProvider {
    pub name: &'static str,
    /// Whether the warning applies, given the environment and commit count
    pub applies: fn(&dyn Fn(&str) -> Option<String>, usize) -> bool,
    pub message: &'static str,
}

/// Providers in priority order; the first match wins.
pub static CI_PROVIDERS: &[CiProvider] = &[
    CiProvider {
        name: "gitlab",
        applies: gitlab_applies,
        message: "[git-revision-date] Running on a GitLab runner might lead to wrong \
                  Git revision dates due to a shallow git fetch depth. \
                  Make sure to set GIT_DEPTH to 0 in your .gitlab-ci.yml file \
                  (see https://docs.gitlab.com/ee/user/project/repository/monorepos/index.html#shallow-cloning).",
    },
    CiProvider {
        name: "github",
        applies: github_applies,
        message: "[git-revision-date] Running on GitHub Actions might lead to wrong \
                  Git revision dates due to a shallow git fetch depth. \
                  Try setting fetch-depth to 0 in your GitHub Action \
                  (see https://github.com/actions/checkout).",
    },
    CiProvider {
        name: "azure",
        applies: azure_applies,
        message: "[git-revision-date] Running on Azure pipelines with limited \
                  fetch-depth might lead to wrong git revision dates due to a shallow git fetch depth. \
                  Remove any Shallow Fetch settings \
                  (see https://docs.microsoft.com/en-us/azure/devops/pipelines/repos/pipeline-options-for-git?view=azure-devops#shallow-fetch).",
    },
    CiProvider {
        name: "bitbucket",
        applies: bitbucket_applies,
        message: "[git-revision-date] Running on bitbucket pipelines might lead to wrong \
                  Git revision dates due to a shallow git fetch depth. \
                  Try setting \"clone: depth\" to \"full\" in your pipeline \
                  (see https://support.atlassian.com/bitbucket-cloud/docs/configure-bitbucket-pipelinesyml/ \
                  and search 'depth').",
    },
];

/// GitLab's GIT_DEPTH defaults to 50.
fn gitlab_applies(env: &dyn Fn(&str) -> Option<String>, n_commits: usize) -> bool {
    env("GITLAB_CI").is_some() && n_commits < 50
}

/// actions/checkout defaults to a fetch-depth of 1.
fn github_applies(env: &dyn Fn(&str) -> Option<String>, n_commits: usize) -> bool {
    env("GITHUB_ACTIONS").is_some() && n_commits == 1
}

/// Azure does not limit the depth unless a shallow fetch is configured.
fn azure_applies(env: &dyn Fn(&str) -> Option<String>, n_commits: usize) -> bool {
    azure_shallow_depth(env).is_some_and(|depth| depth < n_commits as u64)
}

/// Bitbucket clones 50 commits deep by default.
fn bitbucket_applies(env: &dyn Fn(&str) -> Option<String>, n_commits: usize) -> bool {
    env("BITBUCKET_BUILD_NUMBER").is_some() && n_commits < 50
}

fn azure_shallow_depth(env: &dyn Fn(&str) -> Option<String>) -> Option<u64> {
    ["Agent.Source.Git.ShallowFetchDepth", "AGENT_SOURCE_GIT_SHALLOWFETCHDEPTH"]
        .into_iter()
        .find_map(|key| env(key))
        .and_then(|value| value.trim().parse().ok())
}

/// First provider whose shallow-depth condition holds.
pub fn matching_provider(
    env: &dyn Fn(&str) -> Option<String>,
    n_commits: usize,
) -> Option<&'static CiProvider> {
    CI_PROVIDERS
        .iter()
        .find(|provider| (provider.applies)(env, n_commits))
}

/// Warn about shallow CI checkouts, reading variables from `env`.
///
/// Returns the provider that warned, if any.
pub fn check_with(
    handle: &RepositoryHandle,
    env: &dyn Fn(&str) -> Option<String>,
) -> Option<&'static CiProvider> {
    if !handle.is_shallow() {
        return None;
    }

    let n_commits = match handle.commit_count() {
        Ok(n) => n,
        Err(e) => {
            debug!(
                "Could not count commits in shallow clone {}: {}",
                handle.root().display(),
                e
            );
            return None;
        }
    };
    debug!(
        "Shallow clone at {} exposes {} commits",
        handle.root().display(),
        n_commits
    );

    let provider = matching_provider(env, n_commits)?;
    warn!("{}", provider.message);
    Some(provider)
}
