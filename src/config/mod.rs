//! Configuration for revision date resolution
//!
//! Loads settings from `git-revision-date.toml` or `.git-revision-date.json`
//! in the project directory.
//!
//! # Configuration Format
//!
//! ```toml
//! # git-revision-date.toml
//! fallback_to_build_date = false
//! strict = true
//! enable_git_follow = true
//! enable_creation_date = true
//! enable_parallel_processing = true
//! ignored_commits_file = ".git-blame-ignore-revs"
//! exclude = ["generated/*", "*.tmp.md"]
//! max_workers = 4
//! ```

mod exclude;

pub use exclude::ExcludeMatcher;

use crate::git::{FailurePolicy, ResolveOptions};
use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// TOML config file name, looked up in the project directory
pub const CONFIG_FILE_TOML: &str = "git-revision-date.toml";
/// JSON config file name, looked up in the project directory
pub const CONFIG_FILE_JSON: &str = ".git-revision-date.json";

/// Revision date settings. Unset fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RevisionDateConfig {
    /// When false nothing is queried and every file gets the build time
    pub enabled: bool,
    /// Use the build time instead of failing when history is unavailable
    pub fallback_to_build_date: bool,
    /// Log fallback use at `warn` (true) or `info` (false)
    pub strict: bool,
    /// Track history across renames
    pub enable_git_follow: bool,
    /// Also resolve creation dates
    pub enable_creation_date: bool,
    /// Resolve all files up front on a worker pool
    pub enable_parallel_processing: bool,
    /// Ignore-revs file, relative to the config directory unless absolute
    pub ignored_commits_file: Option<PathBuf>,
    /// Globs on docs-relative paths that are never resolved
    pub exclude: Vec<String>,
    /// Lower cap on worker threads (never above [`crate::pipeline::MAX_WORKERS`])
    pub max_workers: Option<usize>,
}

impl Default for RevisionDateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_to_build_date: false,
            strict: true,
            enable_git_follow: true,
            enable_creation_date: false,
            enable_parallel_processing: true,
            ignored_commits_file: None,
            exclude: Vec::new(),
            max_workers: None,
        }
    }
}

impl RevisionDateConfig {
    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy {
            fallback_to_build_date: self.fallback_to_build_date,
            strict: self.strict,
        }
    }

    pub fn resolve_options(&self) -> ResolveOptions {
        ResolveOptions {
            follow_renames: self.enable_git_follow,
            policy: self.failure_policy(),
        }
    }

    /// Absolute location of the ignore-revs file, if one is configured.
    pub fn ignored_commits_path(&self, config_dir: &Path) -> Option<PathBuf> {
        self.ignored_commits_file.as_ref().map(|file| {
            if file.is_absolute() {
                file.clone()
            } else {
                config_dir.join(file)
            }
        })
    }

    /// Parse TOML config content.
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).context("invalid git-revision-date TOML config")
    }

    /// Parse JSON config content.
    pub fn from_json_str(content: &str) -> anyhow::Result<Self> {
        serde_json::from_str(content).context("invalid git-revision-date JSON config")
    }
}

/// Load configuration from `dir`, falling back to defaults.
///
/// TOML wins over JSON when both exist. A file that cannot be read or parsed
/// is reported and skipped.
pub fn load_config(dir: &Path) -> RevisionDateConfig {
    let toml_path = dir.join(CONFIG_FILE_TOML);
    if toml_path.exists() {
        match load_file(&toml_path, RevisionDateConfig::from_toml_str) {
            Ok(config) => {
                debug!("Loaded revision date config from {}", toml_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", toml_path.display(), e);
            }
        }
    }

    let json_path = dir.join(CONFIG_FILE_JSON);
    if json_path.exists() {
        match load_file(&json_path, RevisionDateConfig::from_json_str) {
            Ok(config) => {
                debug!("Loaded revision date config from {}", json_path.display());
                return config;
            }
            Err(e) => {
                warn!("Failed to load {}: {:#}", json_path.display(), e);
            }
        }
    }

    debug!("No revision date config found, using defaults");
    RevisionDateConfig::default()
}

fn load_file(
    path: &Path,
    parse: fn(&str) -> anyhow::Result<RevisionDateConfig>,
) -> anyhow::Result<RevisionDateConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse(&content)
}
