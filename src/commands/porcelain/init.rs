use crate::DEFAULT_BRANCH;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::core::repository_error::RepositoryError;
use anyhow::Context;
use std::fs;

impl Repository {
    /// Create an empty repository whose HEAD points at the unborn
    /// `initial_branch` (or `master`)
    pub async fn init(&mut self, initial_branch: Option<&str>) -> anyhow::Result<()> {
        if self.is_initialized() {
            return Err(RepositoryError::RepoAlreadyExists(self.git_path().to_path_buf()).into());
        }

        let branch = BranchName::try_parse(initial_branch.unwrap_or(DEFAULT_BRANCH).to_string())?;

        fs::create_dir_all(self.database().objects_path())
            .context("failed to create the objects directory")?;
        fs::create_dir_all(self.refs().heads_path())
            .context("failed to create the refs/heads directory")?;

        self.refs()
            .create_unborn(&branch)
            .context("failed to record the initial branch")?;
        self.refs()
            .set_symbolic(&branch)
            .context("failed to create the initial HEAD reference")?;

        writeln!(
            self.writer(),
            "Initialized empty mygit repository in {}",
            self.git_path().display()
        )?;

        Ok(())
    }
}
