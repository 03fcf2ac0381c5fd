use crate::areas::repository::Repository;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::objects::object::Object;
use std::path::{Path, PathBuf};

impl Repository {
    /// Stop tracking paths and, unless `cached`, delete them from disk
    ///
    /// Refuses to delete a working copy whose content differs from what is
    /// staged, or that is still conflicted, since that content exists
    /// nowhere else.
    pub async fn rm(&mut self, paths: &[String], cached: bool, recursive: bool) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let mut targets = Vec::<PathBuf>::new();
        for user_path in paths {
            let path = self.workspace().relative_path(Path::new(user_path))?;

            if index.is_tracked_file(&path) {
                targets.push(path);
            } else if index.is_directly_tracked(&path) {
                if !recursive {
                    anyhow::bail!("not removing '{user_path}' recursively without -r");
                }
                targets.extend(index.entries_under_path(&path));
            } else {
                return Err(RepositoryError::path_not_found(Path::new(user_path)).into());
            }
        }

        if !cached {
            let modified = targets
                .iter()
                .filter(|path| self.workspace().exists(path) && !self.workspace().is_dir(path))
                .filter_map(|path| {
                    // a conflicted path has no stage 0 entry, and its working
                    // copy may hold a partial resolution
                    let Some(staged) = index.entry_by_path(path) else {
                        return Some(path.clone());
                    };
                    match self.workspace().parse_blob(path) {
                        Ok(blob) => blob
                            .object_id()
                            .map(|oid| oid != staged.oid)
                            .unwrap_or(true)
                            .then(|| path.clone()),
                        Err(_) => Some(path.clone()),
                    }
                })
                .collect::<Vec<_>>();

            if !modified.is_empty() {
                eprintln!("error: the following files have local modifications:");
                for path in &modified {
                    eprintln!("\t{}", path.display());
                }
                return Err(RepositoryError::UncommittedChanges(modified).into());
            }
        }

        for path in &targets {
            index.remove(path);
            if !cached {
                self.workspace().remove_file(path)?;
            }
            writeln!(self.writer(), "rm '{}'", path.display())?;
        }

        index.write_updates()?;

        Ok(())
    }
}
