use crate::areas::refs::Head;
use crate::areas::repository::Repository;
use crate::artifacts::status::status_info::{ChangeSet, StatusInfo};
use colored::Colorize;
use std::collections::BTreeMap;

impl Repository {
    /// Report staged, unstaged, conflicted and untracked paths
    ///
    /// The index gets refreshed stat data for files whose timestamps moved
    /// but whose content did not, so later runs skip rehashing them.
    pub async fn status(&mut self, porcelain: bool) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let status = self.tree_status().initialize(&mut index).await?;
        index.write_updates()?;

        if porcelain {
            self.print_porcelain_format(&status)
        } else {
            self.print_long_format(&status)
        }
    }

    fn print_porcelain_format(&self, status: &StatusInfo) -> anyhow::Result<()> {
        let mut lines = status
            .changed_files()
            .iter()
            .map(|(path, change)| (path.clone(), change.to_string()))
            .collect::<BTreeMap<_, _>>();
        lines.extend(
            status
                .conflicts()
                .iter()
                .map(|(path, conflict)| (path.clone(), conflict.porcelain_code().to_string())),
        );

        for (path, code) in lines {
            writeln!(self.writer(), "{} {}", code, path.display())?;
        }
        for path in status.untracked_files() {
            writeln!(self.writer(), "?? {}", path.display())?;
        }

        Ok(())
    }

    fn print_long_format(&self, status: &StatusInfo) -> anyhow::Result<()> {
        match self.refs().head()? {
            Head::Branch { name, oid } => {
                writeln!(self.writer(), "On branch {name}")?;
                if oid.is_none() {
                    writeln!(self.writer(), "\nNo commits yet")?;
                }
            }
            Head::Detached(oid) => {
                writeln!(self.writer(), "{} {}", "HEAD detached at".red(), oid.to_short_oid())?;
            }
        }

        if self.merge_state().is_in_progress() {
            if status.conflicts().is_empty() {
                writeln!(self.writer(), "\nAll conflicts fixed but you are still merging.")?;
                writeln!(self.writer(), "  (use \"mygit commit\" to conclude merge)")?;
            } else {
                writeln!(self.writer(), "\nYou have unmerged paths.")?;
                writeln!(self.writer(), "  (fix conflicts and run \"mygit commit\")")?;
                writeln!(self.writer(), "  (use \"mygit merge --abort\" to abort the merge)")?;
            }
        }

        self.print_changeset(
            "Changes to be committed:",
            "(use \"mygit rm --cached <file>...\" to unstage)",
            status.index_changes(),
        )?;

        if !status.conflicts().is_empty() {
            writeln!(self.writer(), "\nUnmerged paths:")?;
            writeln!(self.writer(), "  (use \"mygit add <file>...\" to mark resolution)")?;
            for (path, conflict) in status.conflicts() {
                writeln!(self.writer(), "{}{}", conflict, path.display().to_string().red())?;
            }
        }

        self.print_changeset(
            "Changes not staged for commit:",
            "(use \"mygit add <file>...\" to update what will be committed)",
            status.workspace_changes(),
        )?;

        if !status.untracked_files().is_empty() {
            writeln!(self.writer(), "\nUntracked files:")?;
            writeln!(
                self.writer(),
                "  (use \"mygit add <file>...\" to include in what will be committed)"
            )?;
            for path in status.untracked_files() {
                writeln!(self.writer(), "\t{}", path.display().to_string().red())?;
            }
        }

        self.print_commit_hint(status)
    }

    fn print_changeset(&self, title: &str, hint: &str, changes: &ChangeSet) -> anyhow::Result<()> {
        if changes.is_empty() {
            return Ok(());
        }

        writeln!(self.writer(), "\n{title}")?;
        writeln!(self.writer(), "  {hint}")?;
        for (path, change) in changes {
            writeln!(self.writer(), "{}{}", change, path.display())?;
        }

        Ok(())
    }

    fn print_commit_hint(&self, status: &StatusInfo) -> anyhow::Result<()> {
        let has_staged = !status.index_changes().is_empty();
        let has_unstaged = !status.workspace_changes().is_empty() || !status.conflicts().is_empty();

        let hint = match (has_staged, has_unstaged, status.untracked_files().is_empty()) {
            (true, _, _) => return Ok(()),
            (false, true, _) => "no changes added to commit (use \"mygit add\")",
            (false, false, false) => {
                "nothing added to commit but untracked files present (use \"mygit add\" to track)"
            }
            (false, false, true) => "nothing to commit, working tree clean",
        };

        writeln!(self.writer(), "\n{hint}")?;

        Ok(())
    }
}
