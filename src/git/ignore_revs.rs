//! Ignored-commit lists
//!
//! Same format as git's `blame.ignoreRevsFile`: one commit hash (or unique
//! prefix) per line, `#` starts a comment, surrounding whitespace and blank
//! lines are ignored.

use crate::error::GitHistoryError;
use std::path::Path;
use tracing::{debug, error};

/// Parse an ignore-revs file into its commit hashes, in file order.
///
/// An unreadable file is logged and treated as empty; it never fails a build.
pub fn parse_ignore_revs(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_ignore_revs_str(&content),
        Err(source) => {
            let err = GitHistoryError::IgnoreFileUnreadable {
                path: path.to_path_buf(),
                source,
            };
            error!("{}", err);
            Vec::new()
        }
    }
}

/// Parse ignore-revs content that is already in memory.
pub fn parse_ignore_revs_str(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Immutable set of commit prefixes excluded from last-change resolution.
#[derive(Debug, Clone, Default)]
pub struct IgnoreList {
    prefixes: Vec<String>,
}

impl IgnoreList {
    pub fn new(prefixes: Vec<String>) -> Self {
        Self { prefixes }
    }

    /// Load from an ignore-revs file (see [`parse_ignore_revs`]).
    pub fn load(path: &Path) -> Self {
        let list = Self::new(parse_ignore_revs(path));
        debug!(
            "Loaded {} ignored commit(s) from {}",
            list.len(),
            path.display()
        );
        list
    }

    /// Whether `hash` starts with any listed prefix.
    pub fn is_ignored(&self, hash: &str) -> bool {
        self.prefixes.iter().any(|prefix| hash.starts_with(prefix.as_str()))
    }

    pub fn len(&self) -> usize {
        self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}
