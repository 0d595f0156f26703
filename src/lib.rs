//! git-revision-date - per-file revision dates from git history
//!
//! Resolves, for every page of a documentation build, the commit (hash and
//! unix timestamp) of its most recent relevant change and optionally of its
//! creation. Renames are followed, ignored commits are skipped, shallow CI
//! clones are diagnosed, and missing history degrades to the build time when
//! configured to.
//!
//! # Example
//!
//! ```no_run
//! use git_revision_date::config::load_config;
//! use git_revision_date::pipeline::{RevisionSession, SourceFile};
//! use std::path::Path;
//!
//! let project = Path::new("/path/to/site");
//! let session = RevisionSession::new(load_config(project), project);
//!
//! let files = vec![SourceFile::new(project.join("docs/index.md"), "index.md")];
//! session.prefetch(&files, None)?;
//!
//! if let Some(page) = session.page_revision(&files[0])? {
//!     println!("last updated {} ({})", page.last_update.timestamp, page.last_update_tag);
//! }
//! # Ok::<(), git_revision_date::GitHistoryError>(())
//! ```

pub mod config;
pub mod error;
pub mod git;
pub mod pipeline;

pub use config::{load_config, RevisionDateConfig};
pub use error::{FailureKind, GitHistoryError, GitResult};
pub use git::{CommitTimestampResolver, QueryKind, RepositoryCache, ResolvedTimestamp};
pub use pipeline::{PageRevision, RevisionSession, SourceFile};
