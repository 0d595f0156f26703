//! Git history resolution
//!
//! Provides functionality for finding when a file was last meaningfully
//! changed and when it was created.
//!
//! # Features
//!
//! - Repository root discovery with one cached handle per root
//! - Last-change and creation queries, following renames
//! - Ignored-commit lists (`.git-blame-ignore-revs` format)
//! - Shallow clone warnings for common CI providers
//! - Tag lookup for resolved commits
//!
//! # Example
//!
//! ```no_run
//! use git_revision_date::git::{
//!     CommitTimestampResolver, IgnoreList, QueryKind, RepositoryCache, ResolveOptions,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let repos = Arc::new(RepositoryCache::new());
//! let resolver = CommitTimestampResolver::new(
//!     repos,
//!     Arc::new(IgnoreList::default()),
//!     ResolveOptions::default(),
//! );
//! let last = resolver
//!     .resolve(Path::new("docs/index.md"), QueryKind::LastChange)
//!     .unwrap();
//! println!("{} {}", last.commit_hash, last.timestamp);
//! ```

pub mod ci;
pub mod command;
pub mod ignore_revs;
pub mod policy;
pub mod repository;
pub mod tags;
pub mod timestamps;

pub use ci::{CiProvider, EnvLookup, CI_PROVIDERS};
pub use ignore_revs::{parse_ignore_revs, IgnoreList};
pub use policy::FailurePolicy;
pub use repository::{RepositoryCache, RepositoryHandle};
pub use tags::tag_for;
pub use timestamps::{CommitTimestampResolver, QueryKind, ResolveOptions, ResolvedTimestamp};
