use crate::areas::refs::write_atomically;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::path::{Path, PathBuf};

const MERGE_HEAD: &str = "MERGE_HEAD";
const ORIG_HEAD: &str = "ORIG_HEAD";
const MERGE_MSG: &str = "MERGE_MSG";

/// Files recording a merge that stopped on conflicts
///
/// `MERGE_HEAD` holds their commit, `ORIG_HEAD` our commit before the merge
/// and `MERGE_MSG` the message the concluding commit defaults to.
#[derive(Debug)]
pub struct MergeState<'r> {
    git_path: &'r Path,
}

impl<'r> MergeState<'r> {
    pub fn new(git_path: &'r Path) -> Self {
        MergeState { git_path }
    }

    fn file_path(&self, name: &str) -> PathBuf {
        self.git_path.join(name)
    }

    pub fn is_in_progress(&self) -> bool {
        self.file_path(MERGE_HEAD).is_file()
    }

    pub fn start(&self, theirs: &ObjectId, orig_head: &ObjectId, message: &str) -> anyhow::Result<()> {
        write_atomically(&self.file_path(ORIG_HEAD), orig_head.as_ref())?;
        write_atomically(&self.file_path(MERGE_MSG), message)?;
        // written last: its presence is what marks the merge as in progress
        write_atomically(&self.file_path(MERGE_HEAD), theirs.as_ref())
    }

    pub fn merge_head(&self) -> anyhow::Result<ObjectId> {
        self.read_oid(MERGE_HEAD)
    }

    pub fn orig_head(&self) -> anyhow::Result<ObjectId> {
        self.read_oid(ORIG_HEAD)
    }

    pub fn message(&self) -> anyhow::Result<Option<String>> {
        let path = self.file_path(MERGE_MSG);
        if !path.is_file() {
            return Ok(None);
        }

        let message = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        Ok(Some(message.trim_end().to_string()))
    }

    fn read_oid(&self, name: &str) -> anyhow::Result<ObjectId> {
        if !self.is_in_progress() {
            return Err(RepositoryError::NoMergeInProgress.into());
        }

        let path = self.file_path(name);
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        ObjectId::try_parse(content.trim().to_string())
            .with_context(|| format!("invalid object id in {}", path.display()))
    }

    pub fn clear(&self) -> anyhow::Result<()> {
        for name in [MERGE_HEAD, ORIG_HEAD, MERGE_MSG] {
            let path = self.file_path(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn state_round_trips_and_clears() {
        let dir = TempDir::new().unwrap();
        let state = MergeState::new(dir.path());
        let theirs = ObjectId::hash_bytes(b"theirs");
        let ours = ObjectId::hash_bytes(b"ours");

        assert!(!state.is_in_progress());
        state.start(&theirs, &ours, "Merge branch 'test' into main").unwrap();

        assert!(state.is_in_progress());
        assert_eq!(state.merge_head().unwrap(), theirs);
        assert_eq!(state.orig_head().unwrap(), ours);
        assert_eq!(
            state.message().unwrap().as_deref(),
            Some("Merge branch 'test' into main")
        );

        state.clear().unwrap();
        assert!(!state.is_in_progress());
        assert!(state.message().unwrap().is_none());
    }

    #[test]
    fn reading_without_a_merge_fails() {
        let dir = TempDir::new().unwrap();

        let err = MergeState::new(dir.path()).merge_head().unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::NoMergeInProgress)
        ));
    }
}
