//! Fallback-versus-propagate decision for resolution failures

use crate::error::{GitHistoryError, GitResult};
use crate::git::timestamps::ResolvedTimestamp;
use tracing::{error, info, warn};

/// How resolution failures and missing history are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Replace failures with the build time instead of propagating them
    pub fallback_to_build_date: bool,
    /// Soft diagnostics go to `warn` instead of `info`
    pub strict: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            fallback_to_build_date: false,
            strict: true,
        }
    }
}

impl FailurePolicy {
    /// Log at the soft level: `warn` in strict mode, `info` otherwise.
    pub fn soft_log(&self, message: &str) {
        if self.strict {
            warn!("{}", message);
        } else {
            info!("{}", message);
        }
    }

    /// Turn a failure into a fallback timestamp, or log and propagate it.
    pub fn recover(&self, err: GitHistoryError) -> GitResult<ResolvedTimestamp> {
        if self.fallback_to_build_date && !err.is_dubious_ownership() {
            self.soft_log(&format!(
                "[git-revision-date] {}: {}. Option 'fallback_to_build_date' set to 'true': Falling back to build date",
                describe(&err),
                err.path().display()
            ));
            return Ok(ResolvedTimestamp::fallback());
        }

        error!("[git-revision-date] {}", err);
        Err(err)
    }
}

fn describe(err: &GitHistoryError) -> &'static str {
    match err {
        GitHistoryError::RepositoryNotFound { .. } => "Unable to find a git directory",
        GitHistoryError::QueryExecutionFailed { .. } => {
            "Unable to read git logs. Is git log readable?"
        }
        GitHistoryError::ToolUnavailable { .. } => {
            "Unable to perform command 'git log'. Is git installed?"
        }
        GitHistoryError::UnexpectedFailure { .. } => "An unexpected error occurred",
        GitHistoryError::IgnoreFileUnreadable { .. } => "Unable to read the ignored commits file",
    }
}
