use crate::MYGIT_DIR;
use crate::artifacts::checkout::migration::{ActionType, Migration};
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::index::entry_mode::EntryMode;
use crate::artifacts::index::index_entry::EntryMetadata;
use crate::artifacts::objects::blob::Blob;
use anyhow::Context;
use bytes::Bytes;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// The working directory; every path it hands out or accepts is relative to
/// the repository root
#[derive(Debug)]
pub struct Workspace {
    path: Box<Path>,
}

impl Workspace {
    pub fn new(path: Box<Path>) -> Self {
        Workspace { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn full_path(&self, path: &Path) -> PathBuf {
        self.path.join(path)
    }

    /// Turn a user supplied path into a root relative one
    ///
    /// A relative path is taken from the current directory when that lands
    /// inside the workspace, and from the workspace root otherwise.
    pub fn relative_path(&self, path: &Path) -> anyhow::Result<PathBuf> {
        let from_cwd = if path.is_absolute() {
            Some(path.to_path_buf())
        } else {
            std::env::current_dir().ok().map(|cwd| cwd.join(path))
        };

        if let Some(candidate) = from_cwd.map(|candidate| Self::resolve_existing_prefix(&candidate)) {
            if let Ok(relative) = candidate.strip_prefix(&self.path) {
                return Self::normalize(relative, path);
            }
            if path.is_absolute() {
                return Err(RepositoryError::path_not_found(path).into());
            }
        }

        Self::normalize(path, path)
    }

    /// Canonicalize the longest existing ancestor so that symlinked
    /// directories compare equal to the canonical workspace root
    fn resolve_existing_prefix(path: &Path) -> PathBuf {
        for ancestor in path.ancestors() {
            if let Ok(canonical) = ancestor.canonicalize() {
                let rest = path.strip_prefix(ancestor).unwrap_or(Path::new(""));
                return canonical.join(rest);
            }
        }

        path.to_path_buf()
    }

    fn normalize(relative: &Path, original: &Path) -> anyhow::Result<PathBuf> {
        let mut normalized = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(name) => normalized.push(name),
                Component::CurDir => {}
                _ => return Err(RepositoryError::path_not_found(original).into()),
            }
        }

        Ok(normalized)
    }

    pub fn exists(&self, path: &Path) -> bool {
        self.full_path(path).exists()
    }

    pub fn is_dir(&self, path: &Path) -> bool {
        self.full_path(path).is_dir()
    }

    fn is_ignored(path: &Path) -> bool {
        path.components()
            .any(|component| component.as_os_str() == MYGIT_DIR)
    }

    fn to_relative(&self, path: &Path) -> Option<PathBuf> {
        let relative = path.strip_prefix(&self.path).ok()?;
        if relative.as_os_str().is_empty() || Self::is_ignored(relative) {
            None
        } else {
            Some(relative.to_path_buf())
        }
    }

    /// Direct children of a directory (the root when `None`)
    pub fn list_dir(&self, dir_path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let dir_path = match dir_path {
            Some(path) => self.full_path(path),
            None => self.path.to_path_buf(),
        };

        if !dir_path.is_dir() {
            anyhow::bail!("not a directory: {}", dir_path.display());
        }

        let mut children = std::fs::read_dir(&dir_path)
            .with_context(|| format!("unable to read directory {}", dir_path.display()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| self.to_relative(&entry.path()))
            .collect::<Vec<_>>();
        children.sort();

        Ok(children)
    }

    /// Every file at or below a path (the root when `None`), sorted
    pub fn list_files(&self, root_path: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
        let root_path = match root_path {
            Some(path) => self.full_path(path),
            None => self.path.to_path_buf(),
        };

        if !root_path.exists() {
            return Err(RepositoryError::path_not_found(&root_path).into());
        }

        let mut files = WalkDir::new(&root_path)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != MYGIT_DIR)
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.to_relative(entry.path()))
            .collect::<Vec<_>>();
        files.sort();

        Ok(files)
    }

    pub fn read_file(&self, file_path: &Path) -> anyhow::Result<Bytes> {
        let full_path = self.full_path(file_path);
        let content = std::fs::read(&full_path)
            .with_context(|| format!("unable to read {}", full_path.display()))?;

        Ok(Bytes::from(content))
    }

    pub fn parse_blob(&self, file_path: &Path) -> anyhow::Result<Blob> {
        Ok(Blob::new(self.read_file(file_path)?))
    }

    pub fn stat_file(&self, file_path: &Path) -> anyhow::Result<EntryMetadata> {
        let full_path = self.full_path(file_path);
        let metadata = std::fs::metadata(&full_path)
            .with_context(|| format!("unable to stat {}", full_path.display()))?;

        (full_path.as_path(), metadata).try_into()
    }

    /// Write a file, replacing whatever is in the way (a directory at the
    /// path or files where its parent directories should be)
    pub fn write_file(&self, file_path: &Path, data: &[u8], mode: EntryMode) -> anyhow::Result<()> {
        if let Some(parent) = file_path.parent() {
            self.make_directory(parent)?;
        }

        let full_path = self.full_path(file_path);
        if full_path.is_dir() {
            std::fs::remove_dir_all(&full_path).with_context(|| {
                format!("failed to remove existing directory {}", full_path.display())
            })?;
        }

        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&full_path)
            .with_context(|| format!("failed to open file {}", full_path.display()))?;
        file.write_all(data)
            .with_context(|| format!("failed to write file {}", full_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions =
                std::fs::Permissions::from_mode(if mode.is_executable() { 0o755 } else { 0o644 });
            std::fs::set_permissions(&full_path, permissions).with_context(|| {
                format!("failed to set permissions for {}", full_path.display())
            })?;
        }

        Ok(())
    }

    /// Delete a file and any parent directories left empty
    pub fn remove_file(&self, file_path: &Path) -> anyhow::Result<()> {
        let full_path = self.full_path(file_path);

        if full_path.is_dir() {
            std::fs::remove_dir_all(&full_path)
                .with_context(|| format!("failed to remove {}", full_path.display()))?;
        } else if full_path.exists() {
            std::fs::remove_file(&full_path)
                .with_context(|| format!("failed to remove {}", full_path.display()))?;
        }

        self.prune_empty_dirs(file_path.parent())
    }

    fn prune_empty_dirs(&self, dir_path: Option<&Path>) -> anyhow::Result<()> {
        let Some(dir_path) = dir_path.filter(|dir| !dir.as_os_str().is_empty()) else {
            return Ok(());
        };

        let full_path = self.full_path(dir_path);
        if full_path.is_dir() && full_path.read_dir()?.next().is_none() {
            std::fs::remove_dir(&full_path)
                .with_context(|| format!("failed to remove {}", full_path.display()))?;
            self.prune_empty_dirs(dir_path.parent())?;
        }

        Ok(())
    }

    fn make_directory(&self, dir_path: &Path) -> anyhow::Result<()> {
        let mut current = PathBuf::new();

        for component in dir_path.components() {
            current.push(component);
            let full_path = self.full_path(&current);

            if full_path.is_file() {
                std::fs::remove_file(&full_path)
                    .with_context(|| format!("failed to remove {}", full_path.display()))?;
            }
            if !full_path.exists() {
                std::fs::create_dir(&full_path)
                    .with_context(|| format!("failed to create {}", full_path.display()))?;
            }
        }

        Ok(())
    }

    /// Apply a planned migration: deletions first so that a file can take
    /// the place of a removed directory, then modifications and additions
    pub fn apply_migration(&self, migration: &Migration) -> anyhow::Result<()> {
        for (file_path, _) in migration.actions(ActionType::Delete) {
            self.remove_file(file_path)?;
        }

        for action in [ActionType::Modify, ActionType::Add] {
            for (file_path, entry) in migration.actions(action) {
                let entry = entry
                    .as_ref()
                    .with_context(|| format!("no target entry for {}", file_path.display()))?;
                let data = migration.load_blob_data(&entry.oid)?;

                self.write_file(file_path, &data, entry.mode)?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;
    use assert_fs::prelude::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn root() -> TempDir {
        let root = TempDir::new().unwrap();
        root.child("a.txt").write_str("a").unwrap();
        root.child("dir/b.txt").write_str("b").unwrap();
        root.child("dir/sub/c.txt").write_str("c").unwrap();
        root.child(".mygit/HEAD").write_str("ref: refs/heads/master\n").unwrap();
        root
    }

    fn workspace(root: &TempDir) -> Workspace {
        Workspace::new(root.path().to_path_buf().into_boxed_path())
    }

    #[rstest]
    fn listing_skips_the_repository_directory(root: TempDir) {
        let workspace = workspace(&root);

        pretty_assertions::assert_eq!(
            workspace.list_files(None).unwrap(),
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("dir/b.txt"),
                PathBuf::from("dir/sub/c.txt")
            ]
        );
        pretty_assertions::assert_eq!(
            workspace.list_dir(None).unwrap(),
            vec![PathBuf::from("a.txt"), PathBuf::from("dir")]
        );
    }

    #[rstest]
    fn listing_a_missing_path_fails(root: TempDir) {
        let err = workspace(&root)
            .list_files(Some(Path::new("nope.txt")))
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::PathNotFound(_))
        ));
    }

    #[rstest]
    fn removing_the_last_file_prunes_empty_dirs(root: TempDir) {
        let workspace = workspace(&root);

        workspace.remove_file(Path::new("dir/sub/c.txt")).unwrap();

        assert!(!root.child("dir/sub").exists());
        assert!(root.child("dir/b.txt").exists());
    }

    #[rstest]
    fn writing_replaces_a_file_standing_in_for_a_directory(root: TempDir) {
        let workspace = workspace(&root);

        workspace
            .write_file(Path::new("a.txt/inner.txt"), b"inner", EntryMode::default())
            .unwrap();

        root.child("a.txt/inner.txt").assert("inner");
    }

    #[rstest]
    fn executable_mode_is_written_and_read_back(root: TempDir) {
        let workspace = workspace(&root);
        let mode = EntryMode::File(crate::artifacts::index::entry_mode::FileMode::Executable);

        workspace.write_file(Path::new("run.sh"), b"#!/bin/sh\n", mode).unwrap();

        assert_eq!(workspace.stat_file(Path::new("run.sh")).unwrap().mode, mode);
    }

    #[rstest]
    #[case("./a.txt", "a.txt")]
    #[case("dir/./b.txt", "dir/b.txt")]
    fn user_paths_are_normalized(root: TempDir, #[case] input: &str, #[case] expected: &str) {
        let workspace = workspace(&root);

        assert_eq!(
            workspace.relative_path(Path::new(input)).unwrap(),
            PathBuf::from(expected)
        );
        assert!(workspace.relative_path(Path::new("../escape")).is_err());
    }
}
