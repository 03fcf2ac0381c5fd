//! Branch refs and HEAD
//!
//! ## File Format
//!
//! - `refs/heads/<name>` holds a 40-character commit id
//! - `HEAD` holds either `ref: refs/heads/<name>` or a raw commit id (detached)
//!
//! A branch whose ref file is missing or empty is unborn: HEAD may point at
//! it before the first commit, and `branch` on an unborn HEAD records a new
//! branch as an empty ref file. Every write goes through a `<ref>.lock` file that
//! is renamed over the ref, so readers never observe a half written id.

use crate::artifacts::branch::HEAD_REF_NAME;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use derive_new::new;
use file_guard::Lock;
use std::io::Write;
use std::ops::DerefMut;
use std::path::Path;
use walkdir::WalkDir;

const SYMREF_REGEX: &str = r"^ref: (.+)$";
const LOCK_SUFFIX: &str = "lock";

#[derive(Debug, new)]
pub struct Refs {
    /// The repository directory (`.mygit`)
    path: Box<Path>,
}

/// Where HEAD currently points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// Attached to a branch; `oid` is `None` while the branch is unborn
    Branch {
        name: BranchName,
        oid: Option<ObjectId>,
    },
    Detached(ObjectId),
}

impl Head {
    pub fn oid(&self) -> Option<&ObjectId> {
        match self {
            Head::Branch { oid, .. } => oid.as_ref(),
            Head::Detached(oid) => Some(oid),
        }
    }

    pub fn branch_name(&self) -> Option<&BranchName> {
        match self {
            Head::Branch { name, .. } => Some(name),
            Head::Detached(_) => None,
        }
    }

    pub fn is_detached(&self) -> bool {
        matches!(self, Head::Detached(_))
    }

    /// The commit HEAD points at, or `UnbornHead`
    pub fn require_oid(&self) -> anyhow::Result<&ObjectId> {
        match self {
            Head::Branch { name, oid: None } => {
                Err(RepositoryError::UnbornHead(name.to_string()).into())
            }
            Head::Branch { oid: Some(oid), .. } | Head::Detached(oid) => Ok(oid),
        }
    }
}

#[derive(Debug, Clone)]
enum SymRefOrOid {
    SymRef(String),
    Oid(ObjectId),
}

impl SymRefOrOid {
    fn read(path: &Path) -> anyhow::Result<Option<SymRefOrOid>> {
        if !path.is_file() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read ref file at {}", path.display()))?;
        let content = content.trim();

        if content.is_empty() {
            return Ok(None);
        }

        let symref_match = regex::Regex::new(SYMREF_REGEX)?.captures(content);
        if let Some(symref_match) = symref_match {
            Ok(Some(SymRefOrOid::SymRef(symref_match[1].to_string())))
        } else {
            let oid = ObjectId::try_parse(content.to_string())
                .with_context(|| format!("invalid ref file at {}", path.display()))?;
            Ok(Some(SymRefOrOid::Oid(oid)))
        }
    }
}

impl Refs {
    pub fn head(&self) -> anyhow::Result<Head> {
        match SymRefOrOid::read(&self.head_path())? {
            Some(SymRefOrOid::SymRef(ref_path)) => {
                let name = BranchName::try_parse_ref_path(&ref_path)?;
                let oid = self.read_branch(&name)?;
                Ok(Head::Branch { name, oid })
            }
            Some(SymRefOrOid::Oid(oid)) => Ok(Head::Detached(oid)),
            None => anyhow::bail!("HEAD is missing or empty at {}", self.head_path().display()),
        }
    }

    /// Attach HEAD to a branch, born or not
    pub fn set_symbolic(&self, name: &BranchName) -> anyhow::Result<()> {
        write_atomically(&self.head_path(), &format!("ref: {}", name.to_ref_path()))
    }

    pub fn set_detached(&self, oid: &ObjectId) -> anyhow::Result<()> {
        write_atomically(&self.head_path(), oid.as_ref())
    }

    /// Advance whatever HEAD points at: the current branch, or HEAD itself
    /// when detached. Gives birth to an unborn branch.
    pub fn update_head(&self, oid: &ObjectId) -> anyhow::Result<()> {
        match self.head()? {
            Head::Branch { name, .. } => write_atomically(&self.branch_path(&name), oid.as_ref()),
            Head::Detached(_) => self.set_detached(oid),
        }
    }

    pub fn create(&self, name: &BranchName, oid: &ObjectId) -> anyhow::Result<()> {
        if self.branch_exists(name) {
            return Err(RepositoryError::RefAlreadyExists(name.to_string()).into());
        }

        write_atomically(&self.branch_path(name), oid.as_ref())
    }

    /// Record a branch that has no commit yet
    pub fn create_unborn(&self, name: &BranchName) -> anyhow::Result<()> {
        if self.branch_exists(name) {
            return Err(RepositoryError::RefAlreadyExists(name.to_string()).into());
        }

        write_atomically(&self.branch_path(name), "")
    }

    pub fn update(&self, name: &BranchName, oid: &ObjectId) -> anyhow::Result<()> {
        if !self.branch_exists(name) {
            return Err(RepositoryError::RefNotFound(name.to_string()).into());
        }

        write_atomically(&self.branch_path(name), oid.as_ref())
    }

    /// The commit a branch points at; `UnbornHead` for a branch without one
    pub fn resolve(&self, name: &BranchName) -> anyhow::Result<ObjectId> {
        match self.read_branch(name)? {
            Some(oid) => Ok(oid),
            None if self.branch_exists(name) => {
                Err(RepositoryError::UnbornHead(name.to_string()).into())
            }
            None => Err(RepositoryError::RefNotFound(name.to_string()).into()),
        }
    }

    pub fn read_branch(&self, name: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        match SymRefOrOid::read(&self.branch_path(name))? {
            Some(SymRefOrOid::Oid(oid)) => Ok(Some(oid)),
            Some(SymRefOrOid::SymRef(target)) => {
                anyhow::bail!("branch {name} is a symbolic ref to {target}")
            }
            None => Ok(None),
        }
    }

    pub fn branch_exists(&self, name: &BranchName) -> bool {
        self.branch_path(name).is_file()
    }

    /// Remove a branch ref and return the commit it pointed at, if any
    pub fn delete(&self, name: &BranchName) -> anyhow::Result<Option<ObjectId>> {
        if !self.branch_exists(name) {
            return Err(RepositoryError::RefNotFound(name.to_string()).into());
        }
        let oid = self.read_branch(name)?;
        let branch_path = self.branch_path(name);

        std::fs::remove_file(&branch_path)
            .with_context(|| format!("failed to delete branch file at {}", branch_path.display()))?;
        self.prune_empty_parent_dirs(&branch_path)?;

        Ok(oid)
    }

    /// All recorded branches, unborn ones included, sorted by name
    pub fn list_branches(&self) -> anyhow::Result<Vec<BranchName>> {
        let heads_path = self.heads_path();

        let mut branches = WalkDir::new(&heads_path)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry.path().extension().and_then(|ext| ext.to_str()) != Some(LOCK_SUFFIX)
            })
            .filter_map(|entry| {
                let relative_path = entry.path().strip_prefix(&heads_path).ok()?;
                BranchName::try_parse(relative_path.to_string_lossy().to_string()).ok()
            })
            .collect::<Vec<_>>();
        branches.sort();

        Ok(branches)
    }

    fn prune_empty_parent_dirs(&self, path: &Path) -> anyhow::Result<()> {
        let heads_path = self.heads_path();

        if let Some(parent) = path.parent()
            && parent != heads_path.as_ref()
            && parent.read_dir()?.next().is_none()
        {
            std::fs::remove_dir(parent).with_context(|| {
                format!("failed to remove empty branch directory at {}", parent.display())
            })?;
            self.prune_empty_parent_dirs(parent)?;
        }

        Ok(())
    }

    pub fn head_path(&self) -> Box<Path> {
        self.path.join(HEAD_REF_NAME).into_boxed_path()
    }

    pub fn heads_path(&self) -> Box<Path> {
        self.path.join("refs").join("heads").into_boxed_path()
    }

    fn branch_path(&self, name: &BranchName) -> Box<Path> {
        self.path.join(name.to_path()).into_boxed_path()
    }
}

/// Replace a small text file so that readers see either the old or the new
/// content: write `<path>.lock` under an exclusive lock, then rename it over
/// `path`.
pub fn write_atomically(path: &Path, content: &str) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("invalid ref path {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("failed to create directory {}", parent.display()))?;

    let lock_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.{LOCK_SUFFIX}", ext.to_string_lossy()),
        None => LOCK_SUFFIX.to_string(),
    });

    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&lock_path)
        .with_context(|| format!("failed to open lock file at {}", lock_path.display()))?;
    {
        let mut lock = file_guard::try_lock(&mut lock_file, Lock::Exclusive, 0, 1)
            .map_err(|_| RepositoryError::RepositoryLocked(lock_path.clone()))?;
        writeln!(lock.deref_mut(), "{content}")?;
        lock.deref_mut().sync_all()?;
    }

    std::fs::rename(&lock_path, path)
        .with_context(|| format!("failed to move {} into place", lock_path.display()))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use rstest::{fixture, rstest};

    #[fixture]
    fn git_dir() -> TempDir {
        TempDir::new().unwrap()
    }

    fn refs(dir: &TempDir) -> Refs {
        Refs::new(dir.path().to_path_buf().into_boxed_path())
    }

    fn branch(name: &str) -> BranchName {
        BranchName::try_parse(name.to_string()).unwrap()
    }

    fn oid(seed: &str) -> ObjectId {
        ObjectId::hash_bytes(seed.as_bytes())
    }

    #[rstest]
    fn symbolic_head_starts_unborn(git_dir: TempDir) {
        let refs = refs(&git_dir);
        refs.set_symbolic(&branch("master")).unwrap();

        let head = refs.head().unwrap();

        assert_eq!(
            head,
            Head::Branch {
                name: branch("master"),
                oid: None
            }
        );
        assert_eq!(
            std::fs::read_to_string(refs.head_path()).unwrap(),
            "ref: refs/heads/master\n"
        );
        let err = head.require_oid().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::UnbornHead(_))
        ));
    }

    #[rstest]
    fn update_head_moves_the_current_branch(git_dir: TempDir) {
        let refs = refs(&git_dir);
        refs.set_symbolic(&branch("master")).unwrap();

        refs.update_head(&oid("first")).unwrap();

        assert_eq!(refs.resolve(&branch("master")).unwrap(), oid("first"));
        assert_eq!(refs.head().unwrap().oid(), Some(&oid("first")));
        assert!(!git_dir.path().join("refs/heads/master.lock").exists());
    }

    #[rstest]
    fn update_head_moves_a_detached_head(git_dir: TempDir) {
        let refs = refs(&git_dir);
        refs.set_detached(&oid("first")).unwrap();

        refs.update_head(&oid("second")).unwrap();

        assert_eq!(refs.head().unwrap(), Head::Detached(oid("second")));
    }

    #[rstest]
    fn creating_an_existing_branch_fails(git_dir: TempDir) {
        let refs = refs(&git_dir);
        refs.create(&branch("topic"), &oid("a")).unwrap();

        let err = refs.create(&branch("topic"), &oid("b")).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::RefAlreadyExists(_))
        ));
        assert_eq!(refs.resolve(&branch("topic")).unwrap(), oid("a"));
    }

    #[rstest]
    fn updating_or_resolving_a_missing_branch_fails(git_dir: TempDir) {
        let refs = refs(&git_dir);

        for err in [
            refs.update(&branch("ghost"), &oid("a")).unwrap_err(),
            refs.resolve(&branch("ghost")).unwrap_err(),
        ] {
            assert!(matches!(
                err.downcast_ref::<RepositoryError>(),
                Some(RepositoryError::RefNotFound(_))
            ));
        }
    }

    #[rstest]
    fn branches_are_listed_sorted_and_deleted_with_their_dirs(git_dir: TempDir) {
        let refs = refs(&git_dir);
        for name in ["topic", "feature/login", "alpha"] {
            refs.create(&branch(name), &oid(name)).unwrap();
        }

        pretty_assertions::assert_eq!(
            refs.list_branches().unwrap(),
            vec![branch("alpha"), branch("feature/login"), branch("topic")]
        );

        let deleted = refs.delete(&branch("feature/login")).unwrap();

        assert_eq!(deleted, Some(oid("feature/login")));
        assert!(!git_dir.path().join("refs/heads/feature").exists());
        assert_eq!(refs.list_branches().unwrap().len(), 2);
    }

    #[rstest]
    fn unborn_branches_are_listed_but_do_not_resolve(git_dir: TempDir) {
        let refs = refs(&git_dir);
        refs.set_symbolic(&branch("master")).unwrap();

        refs.create_unborn(&branch("main")).unwrap();

        assert!(refs.branch_exists(&branch("main")));
        assert_eq!(refs.read_branch(&branch("main")).unwrap(), None);
        assert_eq!(refs.list_branches().unwrap(), vec![branch("main")]);
        let err = refs.resolve(&branch("main")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::UnbornHead(_))
        ));

        refs.set_symbolic(&branch("main")).unwrap();
        refs.update_head(&oid("first")).unwrap();
        assert_eq!(refs.resolve(&branch("main")).unwrap(), oid("first"));

        assert!(matches!(
            refs.create_unborn(&branch("main")).unwrap_err().downcast_ref::<RepositoryError>(),
            Some(RepositoryError::RefAlreadyExists(_))
        ));
    }

    #[rstest]
    fn deleting_an_unborn_branch_returns_no_commit(git_dir: TempDir) {
        let refs = refs(&git_dir);
        refs.create_unborn(&branch("main")).unwrap();

        assert_eq!(refs.delete(&branch("main")).unwrap(), None);
        assert!(!refs.branch_exists(&branch("main")));
    }
}
