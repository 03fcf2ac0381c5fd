use crate::areas::index::Index;
use crate::areas::workspace::Workspace;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};
use crate::artifacts::objects::object::Object;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use derive_new::new;
use std::path::Path;

/// Per-path comparisons shared by status and checkout
#[derive(new)]
pub struct Inspector<'r> {
    workspace: &'r Workspace,
}

impl<'r> Inspector<'r> {
    /// Whether a path the index does not track directly belongs in the
    /// untracked list
    ///
    /// Directories qualify only when they hold at least one file, so empty
    /// directory trees are never reported.
    pub fn is_untracked(&self, path: &Path, index: &Index) -> anyhow::Result<bool> {
        if index.is_directly_tracked(path) {
            return Ok(false);
        }
        if !self.workspace.is_dir(path) {
            return Ok(true);
        }

        Ok(!self.workspace.list_files(Some(path))?.is_empty())
    }

    /// Whether a directory holds files the index does not know about
    pub fn has_untracked_files(&self, path: &Path, index: &Index) -> anyhow::Result<bool> {
        Ok(self
            .workspace
            .list_files(Some(path))?
            .iter()
            .any(|file| !index.is_tracked_file(file)))
    }

    fn is_content_changed(&self, index_entry: &IndexEntry) -> anyhow::Result<bool> {
        let blob = self.workspace.parse_blob(&index_entry.name)?;

        Ok(blob.object_id()? != index_entry.oid)
    }

    /// Stat data decides when it can; content is hashed only when size and
    /// mode agree but timestamps moved
    pub fn check_index_against_workspace(
        &self,
        entry: Option<&IndexEntry>,
        stat: Option<&EntryMetadata>,
    ) -> anyhow::Result<WorkspaceChangeType> {
        match (entry, stat) {
            (None, _) => Ok(WorkspaceChangeType::Untracked),
            (Some(_), None) => Ok(WorkspaceChangeType::Deleted),
            (Some(entry), Some(stat)) if !entry.stat_match(stat) => {
                Ok(WorkspaceChangeType::Modified)
            }
            (Some(entry), Some(stat)) if entry.times_match(stat) => Ok(WorkspaceChangeType::None),
            (Some(entry), Some(_)) if self.is_content_changed(entry)? => {
                Ok(WorkspaceChangeType::Modified)
            }
            _ => Ok(WorkspaceChangeType::None),
        }
    }

    pub fn check_index_against_head_tree(
        &self,
        index_entry: Option<&IndexEntry>,
        head_entry: Option<&DatabaseEntry>,
    ) -> IndexChangeType {
        match (index_entry, head_entry) {
            (Some(index_entry), Some(head_entry))
                if head_entry.mode != index_entry.metadata.mode
                    || head_entry.oid != index_entry.oid =>
            {
                IndexChangeType::Modified
            }
            (Some(_), None) => IndexChangeType::Added,
            (None, Some(_)) => IndexChangeType::Deleted,
            _ => IndexChangeType::None,
        }
    }
}
