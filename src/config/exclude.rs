//! Exclusion globs for source files
//!
//! Patterns use fnmatch semantics: `*` may match across `/`, so `drafts/*`
//! also excludes `drafts/2024/post.md`.

use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::warn;

/// Compiled set of exclude patterns.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    set: GlobSet,
    empty: bool,
}

impl ExcludeMatcher {
    /// Compile `patterns`, skipping (and reporting) invalid ones.
    pub fn new(patterns: &[String]) -> Self {
        let mut builder = GlobSetBuilder::new();
        let mut added = 0;
        for pattern in patterns {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    added += 1;
                }
                Err(e) => warn!("Ignoring invalid exclude pattern '{}': {}", pattern, e),
            }
        }
        let set = builder.build().unwrap_or_else(|e| {
            warn!("Failed to compile exclude patterns: {}", e);
            GlobSet::empty()
        });
        Self {
            empty: added == 0 || set.is_empty(),
            set,
        }
    }

    /// Whether the docs-relative `src_path` is excluded.
    pub fn is_excluded(&self, src_path: &Path) -> bool {
        if self.empty {
            return false;
        }
        if self.set.is_match(src_path) {
            return true;
        }
        // Windows paths: retry with forward slashes so the same patterns work
        if std::path::MAIN_SEPARATOR != '/' {
            let normalized = src_path
                .to_string_lossy()
                .replace(std::path::MAIN_SEPARATOR, "/");
            return self.set.is_match(normalized.as_str());
        }
        false
    }
}

impl Default for ExcludeMatcher {
    fn default() -> Self {
        Self::new(&[])
    }
}
