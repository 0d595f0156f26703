//! `git` subprocess boundary
//!
//! Log and tag queries shell out to the `git` executable because libgit2 has
//! no equivalent of `--follow` rename tracking or `--diff-filter`. Every
//! invocation blocks until the child exits; there is no timeout at this layer.

use crate::error::{GitHistoryError, GitResult};
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output};

/// Run `git <args>` inside `repo_root` and return stdout.
///
/// Arguments are passed through as OS strings, so paths that are not valid
/// UTF-8 reach git byte for byte. `subject` is the file the query is about;
/// it is only used to label errors.
pub fn git_at<I, S>(repo_root: &Path, args: I, subject: &Path) -> GitResult<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new("git")
        .current_dir(repo_root)
        .args(args)
        .output()
        .map_err(|e| spawn_error(e, repo_root, subject))?;

    classify_output(output, subject)
}

fn spawn_error(err: std::io::Error, repo_root: &Path, subject: &Path) -> GitHistoryError {
    match err.kind() {
        // A missing working directory also surfaces as NotFound
        ErrorKind::NotFound | ErrorKind::PermissionDenied if repo_root.is_dir() => {
            GitHistoryError::ToolUnavailable {
                path: subject.to_path_buf(),
                source: err,
            }
        }
        _ => GitHistoryError::UnexpectedFailure {
            path: subject.to_path_buf(),
            message: format!("failed to invoke git: {}", err),
        },
    }
}

fn classify_output(output: Output, subject: &Path) -> GitResult<String> {
    if output.status.success() {
        return String::from_utf8(output.stdout).map_err(|e| GitHistoryError::UnexpectedFailure {
            path: subject.to_path_buf(),
            message: format!("git produced non UTF-8 output: {}", e),
        });
    }

    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.contains("not a git repository") {
        return Err(GitHistoryError::RepositoryNotFound {
            path: subject.to_path_buf(),
            reason: stderr,
        });
    }

    Err(GitHistoryError::QueryExecutionFailed {
        path: subject.to_path_buf(),
        stderr,
    })
}
