//! Typed failures surfaced by repository commands
//!
//! Commands return `anyhow::Result` and raise one of these variants whenever the
//! failure belongs to the documented taxonomy. The binary recovers the variant
//! with `downcast_ref` to print its kind and pick the exit code.

use crate::artifacts::objects::object_id::ObjectId;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("repository already exists at {}", .0.display())]
    RepoAlreadyExists(PathBuf),

    #[error("not a mygit repository: {}", .0.display())]
    RepoNotFound(PathBuf),

    #[error("reference '{0}' not found")]
    RefNotFound(String),

    #[error("a branch named '{0}' already exists")]
    RefAlreadyExists(String),

    #[error("branch '{0}' does not have any commits yet")]
    UnbornHead(String),

    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    #[error("object {expected} is corrupt (content hashes to {actual})")]
    ObjectCorrupt { expected: ObjectId, actual: String },

    #[error("your local changes would be overwritten:\n{}", list_paths(.0))]
    UncommittedChanges(Vec<PathBuf>),

    #[error("nothing to commit, working tree clean")]
    EmptyCommit,

    #[error("merge conflict in:\n{}", list_paths(.0))]
    MergeConflict(Vec<PathBuf>),

    #[error("refusing to merge unrelated histories")]
    UnrelatedHistories,

    #[error("unable to lock {}: another mygit process is running", .0.display())]
    RepositoryLocked(PathBuf),

    #[error("pathspec '{}' did not match any files", .0.display())]
    PathNotFound(PathBuf),

    #[error("'{0}' is not a valid branch name")]
    InvalidRefName(String),

    #[error("there is no merge to abort (MERGE_HEAD missing)")]
    NoMergeInProgress,

    #[error("cannot {0} while HEAD is detached")]
    DetachedHead(&'static str),

    #[error("you need to resolve your current index first: a merge is in progress")]
    MergeInProgress,
}

fn list_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|path| format!("\t{}", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

impl RepositoryError {
    /// Stable name of the failure, printed as `error[<kind>]`
    pub fn kind(&self) -> &'static str {
        match self {
            RepositoryError::RepoAlreadyExists(_) => "RepoAlreadyExists",
            RepositoryError::RepoNotFound(_) => "RepoNotFound",
            RepositoryError::RefNotFound(_) => "RefNotFound",
            RepositoryError::RefAlreadyExists(_) => "RefAlreadyExists",
            RepositoryError::UnbornHead(_) => "UnbornHead",
            RepositoryError::ObjectNotFound(_) => "ObjectNotFound",
            RepositoryError::ObjectCorrupt { .. } => "ObjectCorrupt",
            RepositoryError::UncommittedChanges(_) => "UncommittedChanges",
            RepositoryError::EmptyCommit => "EmptyCommit",
            RepositoryError::MergeConflict(_) => "MergeConflict",
            RepositoryError::UnrelatedHistories => "UnrelatedHistories",
            RepositoryError::RepositoryLocked(_) => "RepositoryLocked",
            RepositoryError::PathNotFound(_) => "PathNotFound",
            RepositoryError::InvalidRefName(_) => "InvalidRefName",
            RepositoryError::NoMergeInProgress => "NoMergeInProgress",
            RepositoryError::DetachedHead(_) => "DetachedHead",
            RepositoryError::MergeInProgress => "MergeInProgress",
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            RepositoryError::RepoAlreadyExists(_) => 10,
            RepositoryError::RepoNotFound(_) => 11,
            RepositoryError::RefNotFound(_) => 12,
            RepositoryError::RefAlreadyExists(_) => 13,
            RepositoryError::UnbornHead(_) => 14,
            RepositoryError::ObjectNotFound(_) => 15,
            RepositoryError::ObjectCorrupt { .. } => 16,
            RepositoryError::UncommittedChanges(_) => 17,
            RepositoryError::EmptyCommit => 18,
            RepositoryError::MergeConflict(_) => 19,
            RepositoryError::UnrelatedHistories => 20,
            RepositoryError::RepositoryLocked(_) => 21,
            RepositoryError::PathNotFound(_) => 22,
            RepositoryError::InvalidRefName(_) => 23,
            RepositoryError::NoMergeInProgress => 24,
            RepositoryError::DetachedHead(_) => 25,
            RepositoryError::MergeInProgress => 26,
        }
    }

    pub fn path_not_found(path: &Path) -> Self {
        RepositoryError::PathNotFound(path.to_path_buf())
    }
}
