use crate::areas::repository::Repository;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::index::index_entry::IndexEntry;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stage files, expanding directories recursively
    ///
    /// Tracked files that no longer exist below a given path are unstaged, so
    /// `add .` records deletions too. A path that neither exists nor is
    /// tracked fails the whole command before the index is touched.
    pub async fn add(&mut self, paths: &[String]) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut to_stage = BTreeSet::<PathBuf>::new();
        let mut to_remove = BTreeSet::<PathBuf>::new();

        for user_path in paths {
            let path = self.workspace().relative_path(Path::new(user_path))?;
            let root = (!path.as_os_str().is_empty()).then_some(path.as_path());

            if root.is_none_or(|path| self.workspace().exists(path)) {
                let files = self.workspace().list_files(root)?;
                let gone = index
                    .entries_under_path(root.unwrap_or(Path::new(".")))
                    .into_iter()
                    .filter(|tracked| !self.workspace().exists(tracked));

                to_remove.extend(gone);
                to_stage.extend(files);
            } else if index.is_directly_tracked(&path) {
                to_remove.extend(index.entries_under_path(&path));
            } else {
                return Err(RepositoryError::path_not_found(Path::new(user_path)).into());
            }
        }

        for path in &to_remove {
            index.remove(path);
        }

        for path in to_stage {
            let blob = self.workspace().parse_blob(&path)?;
            let stat = self.workspace().stat_file(&path)?;
            let blob_id = self.database().store(&blob)?;

            index.stage(IndexEntry::new(path, blob_id, stat));
        }

        index.write_updates()?;

        Ok(())
    }
}
