//! Error taxonomy for git history resolution
//!
//! Every resolution failure names the path it was resolving so a failed batch
//! can tell the operator which file broke the build. The ignore-file variant is
//! the only one that never reaches a caller as a hard error: it is logged and
//! degrades to an empty ignore list.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while resolving revision timestamps.
#[derive(Error, Debug)]
pub enum GitHistoryError {
    #[error("Unable to find a git directory for '{}': {reason}. To ignore this error, set option 'fallback_to_build_date: true'", .path.display())]
    RepositoryNotFound { path: PathBuf, reason: String },

    #[error(
        "Unable to read git logs of '{}' (is the history complete, or is this a shallow clone?): {stderr}. To ignore this error, set option 'fallback_to_build_date: true'",
        .path.display()
    )]
    QueryExecutionFailed { path: PathBuf, stderr: String },

    #[error("Unable to perform command 'git log' for '{}'. Is git installed? To ignore this error, set option 'fallback_to_build_date: true'", .path.display())]
    ToolUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("An unexpected error occurred while resolving '{}': {message}. To ignore this error, set option 'fallback_to_build_date: true'", .path.display())]
    UnexpectedFailure { path: PathBuf, message: String },

    #[error("Unable to read ignored commits file {}: {source}", .path.display())]
    IgnoreFileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fieldless classification of a [`GitHistoryError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    RepositoryNotFound,
    QueryExecutionFailed,
    ToolUnavailable,
    UnexpectedFailure,
    IgnoreFileUnreadable,
}

impl GitHistoryError {
    pub fn kind(&self) -> FailureKind {
        match self {
            GitHistoryError::RepositoryNotFound { .. } => FailureKind::RepositoryNotFound,
            GitHistoryError::QueryExecutionFailed { .. } => FailureKind::QueryExecutionFailed,
            GitHistoryError::ToolUnavailable { .. } => FailureKind::ToolUnavailable,
            GitHistoryError::UnexpectedFailure { .. } => FailureKind::UnexpectedFailure,
            GitHistoryError::IgnoreFileUnreadable { .. } => FailureKind::IgnoreFileUnreadable,
        }
    }

    /// The file or directory this error was raised for.
    pub fn path(&self) -> &std::path::Path {
        match self {
            GitHistoryError::RepositoryNotFound { path, .. }
            | GitHistoryError::QueryExecutionFailed { path, .. }
            | GitHistoryError::ToolUnavailable { path, .. }
            | GitHistoryError::UnexpectedFailure { path, .. }
            | GitHistoryError::IgnoreFileUnreadable { path, .. } => path,
        }
    }

    /// Git refused to read a repository owned by another user.
    ///
    /// This is a safety configuration problem on the host, so it is never
    /// replaced by a fallback timestamp.
    pub fn is_dubious_ownership(&self) -> bool {
        matches!(
            self,
            GitHistoryError::QueryExecutionFailed { stderr, .. }
                if stderr.contains("detected dubious ownership")
        )
    }
}

pub type GitResult<T> = Result<T, GitHistoryError>;
