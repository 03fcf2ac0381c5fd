use crate::artifacts::core::repository_error::RepositoryError;
use anyhow::Context;
use file_guard::{FileGuard, Lock};
use std::fs::File;
use std::path::Path;

const LOCK_FILE_NAME: &str = "mygit.lock";

/// Repository-wide writer lock held for the duration of a command
///
/// The OS lock goes away with the guard (or the process), so a crashed
/// command never leaves the repository locked.
pub struct RepositoryLock {
    _guard: FileGuard<Box<File>>,
}

impl RepositoryLock {
    pub fn acquire(git_path: &Path) -> anyhow::Result<Self> {
        let lock_path = git_path.join(LOCK_FILE_NAME);
        let lock_file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("failed to open lock file at {}", lock_path.display()))?;

        let guard = file_guard::try_lock(Box::new(lock_file), Lock::Exclusive, 0, 1)
            .map_err(|_| RepositoryError::RepositoryLocked(lock_path.clone()))?;

        Ok(RepositoryLock { _guard: guard })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::TempDir;

    #[test]
    fn lock_is_released_on_drop() {
        let dir = TempDir::new().unwrap();

        {
            let _lock = RepositoryLock::acquire(dir.path()).unwrap();
        }

        assert!(RepositoryLock::acquire(dir.path()).is_ok());
    }
}
