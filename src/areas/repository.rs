use crate::MYGIT_DIR;
use crate::areas::database::Database;
use crate::areas::index::Index;
use crate::areas::lock::RepositoryLock;
use crate::areas::refs::Refs;
use crate::areas::workspace::Workspace;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::merge::merge_state::MergeState;
use crate::artifacts::status::status_info::Status;
use anyhow::Context;
use std::cell::{RefCell, RefMut};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Explicit handle on one repository, passed to every command
pub struct Repository {
    path: Box<Path>,
    git_path: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    index: Arc<Mutex<Index>>,
    database: Database,
    workspace: Workspace,
    refs: Refs,
}

impl Repository {
    /// Open a handle rooted at `path`; nothing is read or created yet
    pub fn new(path: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        let path = match path.canonicalize() {
            Ok(path) => path,
            Err(_) => std::path::absolute(path)
                .with_context(|| format!("invalid repository path {}", path.display()))?,
        };
        let git_path = path.join(MYGIT_DIR);

        let index = Index::new(git_path.join("index").into_boxed_path());
        let database = Database::new(git_path.join("objects").into_boxed_path());
        let workspace = Workspace::new(path.clone().into_boxed_path());
        let refs = Refs::new(git_path.clone().into_boxed_path());

        Ok(Repository {
            path: path.into_boxed_path(),
            git_path: git_path.into_boxed_path(),
            writer: RefCell::new(writer),
            index: Arc::new(Mutex::new(index)),
            database,
            workspace,
            refs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn git_path(&self) -> &Path {
        &self.git_path
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn index(&self) -> Arc<Mutex<Index>> {
        self.index.clone()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn refs(&self) -> &Refs {
        &self.refs
    }

    pub fn tree_status(&'_ self) -> Status<'_> {
        Status::new(self)
    }

    pub fn merge_state(&'_ self) -> MergeState<'_> {
        MergeState::new(&self.git_path)
    }

    pub fn is_initialized(&self) -> bool {
        self.git_path.is_dir()
    }

    pub fn ensure_initialized(&self) -> anyhow::Result<()> {
        if !self.is_initialized() {
            return Err(RepositoryError::RepoNotFound(self.path.to_path_buf()).into());
        }

        Ok(())
    }

    /// Check the repository exists and take the writer lock
    pub fn lock(&self) -> anyhow::Result<RepositoryLock> {
        self.ensure_initialized()?;

        RepositoryLock::acquire(&self.git_path)
    }

    /// Fail with `MergeInProgress` while MERGE_HEAD exists or the index
    /// still holds conflict stages
    pub async fn ensure_no_merge_in_progress(&self) -> anyhow::Result<()> {
        if self.merge_state().is_in_progress() {
            return Err(RepositoryError::MergeInProgress.into());
        }

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;
        if index.has_conflicts() {
            return Err(RepositoryError::MergeInProgress.into());
        }

        Ok(())
    }
}
