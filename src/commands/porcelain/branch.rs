use crate::areas::refs::Head;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::merge::merge_base::CommitGraph;
use crate::artifacts::objects::object_id::ObjectId;
use colored::Colorize;

impl Repository {
    /// Create `branch_name` at `start_point` (HEAD by default)
    ///
    /// Without a start point on an unborn HEAD the branch is recorded unborn
    /// and gets its first commit once checked out and committed on.
    pub async fn branch(&mut self, branch_name: &str, start_point: Option<&str>) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let branch_name = BranchName::try_parse(branch_name.to_string())?;

        let start_oid = match start_point {
            Some(start_point) => Some(
                Revision::parse(start_point, self.refs())?.resolve(self.refs(), self.database())?,
            ),
            None => self.refs().head()?.oid().cloned(),
        };

        match start_oid {
            Some(start_oid) => self.refs().create(&branch_name, &start_oid),
            None => self.refs().create_unborn(&branch_name),
        }
    }

    /// Print every branch, marking the one HEAD is on
    pub async fn list_branches(&mut self) -> anyhow::Result<()> {
        self.ensure_initialized()?;

        let head = self.refs().head()?;
        if let Head::Detached(oid) = &head {
            writeln!(
                self.writer(),
                "* {}",
                format!("(HEAD detached at {})", oid.to_short_oid()).green()
            )?;
        }

        for branch in self.refs().list_branches()? {
            if head.branch_name() == Some(&branch) {
                writeln!(self.writer(), "* {}", branch.to_string().green())?;
            } else {
                writeln!(self.writer(), "  {branch}")?;
            }
        }

        Ok(())
    }

    /// Delete a branch other than the current one
    ///
    /// The branch tip must be reachable from HEAD, so no commit is lost.
    pub async fn delete_branch(&mut self, branch_name: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let branch_name = BranchName::try_parse(branch_name.to_string())?;
        let head = self.refs().head()?;
        if head.branch_name() == Some(&branch_name) {
            anyhow::bail!("cannot delete branch '{branch_name}' checked out at HEAD");
        }
        if !self.refs().branch_exists(&branch_name) {
            return Err(RepositoryError::RefNotFound(branch_name.to_string()).into());
        }

        if let Some(branch_oid) = self.refs().read_branch(&branch_name)?
            && !self.is_merged_into(&branch_oid, head.oid())?
        {
            anyhow::bail!("the branch '{branch_name}' is not fully merged into HEAD");
        }

        let was = match self.refs().delete(&branch_name)? {
            Some(oid) => oid.to_short_oid(),
            None => "unborn".to_string(),
        };
        writeln!(self.writer(), "Deleted branch {branch_name} (was {was}).")?;

        Ok(())
    }

    fn is_merged_into(&self, branch_oid: &ObjectId, head_oid: Option<&ObjectId>) -> anyhow::Result<bool> {
        let Some(head_oid) = head_oid else {
            return Ok(false);
        };
        let graph = CommitGraph::new(|oid: &ObjectId| self.database().load_slim_commit(oid));

        graph.is_ancestor(branch_oid, head_oid)
    }
}
