//! Git repository access for commit-history indexing
//!
//! Provides range-bounded commit enumeration with the files each commit
//! touched and per-file line statistics.

/// Git repository walking and commit extraction
pub mod walker;

pub use walker::{CommitInfo, FileChange, GitWalker, RangeWalk};
