use crate::areas::refs::Head;
use crate::areas::repository::Repository;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;

/// Printed as `warning[<kind>]: <message>`, in line with error reports
const DETACHED_HEAD_WARNING: &str = "DetachedHeadWarning";
const DETACHED_COMMIT_MESSAGE: &str = "committing on a detached HEAD; \
create a branch to keep this commit reachable";

impl Repository {
    /// Record the index as a commit on top of HEAD
    ///
    /// While a merge is in progress the commit gets MERGE_HEAD as its second
    /// parent and the message defaults to the saved merge message.
    pub async fn commit(&mut self, message: Option<&str>) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let head = self.refs().head()?;
        let merge_state = self.merge_state();
        let merging = merge_state.is_in_progress();

        let mut parents = head.oid().cloned().into_iter().collect::<Vec<_>>();
        if merging {
            parents.push(merge_state.merge_head()?);
        }

        let message = match message {
            Some(message) => message.to_string(),
            None if merging => merge_state.message()?.unwrap_or_default(),
            None => String::new(),
        };
        if message.trim().is_empty() {
            anyhow::bail!("aborting commit due to empty commit message");
        }

        let tree_oid = index.tree_id()?;
        if !merging && self.is_unchanged(&head, &tree_oid, index.entries().next().is_none())? {
            return Err(RepositoryError::EmptyCommit.into());
        }
        index.materialize_as_tree(self.database())?;

        let commit_oid = self.write_commit(parents, tree_oid, message)?;
        merge_state.clear()?;

        self.print_commit_summary(&head, &commit_oid)?;

        Ok(())
    }

    fn is_unchanged(&self, head: &Head, tree_oid: &ObjectId, index_empty: bool) -> anyhow::Result<bool> {
        match head.oid() {
            Some(head_oid) => Ok(self.database().load_commit(head_oid)?.tree_oid() == tree_oid),
            None => Ok(index_empty),
        }
    }

    /// Store a commit authored from the environment and advance HEAD to it
    pub(crate) fn write_commit(
        &self,
        parents: Vec<ObjectId>,
        tree_oid: ObjectId,
        message: String,
    ) -> anyhow::Result<ObjectId> {
        let author = Author::load_from_env();
        let message = message.trim().to_string();

        let commit = Commit::new(parents, tree_oid, author, message);
        let commit_oid = self.database().store(&commit)?;
        self.refs().update_head(&commit_oid)?;

        Ok(commit_oid)
    }

    fn print_commit_summary(&self, head: &Head, commit_oid: &ObjectId) -> anyhow::Result<()> {
        let commit = self.database().load_commit(commit_oid)?;
        let location = match head {
            Head::Branch { name, .. } => name.to_string(),
            Head::Detached(_) => {
                eprintln!("warning[{DETACHED_HEAD_WARNING}]: {DETACHED_COMMIT_MESSAGE}");
                "detached HEAD".to_string()
            }
        };
        let root_marker = if commit.parents().is_empty() { " (root-commit)" } else { "" };

        writeln!(
            self.writer(),
            "[{}{} {}] {}",
            location,
            root_marker,
            commit_oid.to_short_oid(),
            commit.short_message()
        )?;

        Ok(())
    }
}
