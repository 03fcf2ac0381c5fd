//! Tree comparison
//!
//! Diffs are file-level only: which paths were added, deleted or modified
//! between two trees. Content diffs are not produced.

pub mod tree_diff;
