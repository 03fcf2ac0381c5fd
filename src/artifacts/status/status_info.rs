use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry, Stage};
use crate::artifacts::status::file_change::{
    ConflictStatus, FileChange, FileChangeType, IndexChangeType, WorkspaceChangeType,
};
use crate::artifacts::status::inspector::Inspector;
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub type FileStatSet = BTreeMap<PathBuf, EntryMetadata>;
pub type ChangeSet = BTreeMap<PathBuf, FileChangeType>;
pub type FileSet = BTreeSet<PathBuf>;
pub type HeadTree = BTreeMap<PathBuf, DatabaseEntry>;

/// Snapshot of the three-way comparison HEAD / index / working tree
///
/// Untracked directories are reported once, with a trailing separator.
#[derive(Debug, Clone, Default)]
pub struct StatusInfo {
    pub(crate) untracked_files: FileSet,
    pub(crate) changed_files: BTreeMap<PathBuf, FileChange>,
    pub(crate) conflicts: BTreeMap<PathBuf, ConflictStatus>,
    pub(crate) workspace_changeset: ChangeSet,
    pub(crate) index_changeset: ChangeSet,
}

impl StatusInfo {
    pub fn untracked_files(&self) -> &FileSet {
        &self.untracked_files
    }

    pub fn changed_files(&self) -> &BTreeMap<PathBuf, FileChange> {
        &self.changed_files
    }

    pub fn conflicts(&self) -> &BTreeMap<PathBuf, ConflictStatus> {
        &self.conflicts
    }

    pub fn index_changes(&self) -> &ChangeSet {
        &self.index_changeset
    }

    pub fn workspace_changes(&self) -> &ChangeSet {
        &self.workspace_changeset
    }

    /// Nothing staged, nothing modified, nothing conflicted
    ///
    /// Untracked files do not make the tree dirty.
    pub fn is_clean(&self) -> bool {
        self.changed_files.is_empty() && self.conflicts.is_empty()
    }

    /// Tracked paths with staged or unstaged modifications, plus conflicts
    pub fn dirty_paths(&self) -> Vec<PathBuf> {
        self.changed_files
            .keys()
            .chain(self.conflicts.keys())
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(new)]
pub struct Status<'r> {
    repository: &'r Repository,
}

impl<'r> Status<'r> {
    /// Compare HEAD, the index and the working tree
    ///
    /// Entries whose content turns out unchanged get their stat data
    /// refreshed in `index`; the caller decides whether to write it back.
    pub async fn initialize(&self, index: &mut Index) -> anyhow::Result<StatusInfo> {
        let mut file_stats = FileStatSet::new();
        let mut untracked_files = FileSet::new();

        let inspector = Inspector::new(self.repository.workspace());

        self.scan_workspace(
            None,
            &mut untracked_files,
            &mut file_stats,
            index,
            &inspector,
        )
        .await?;
        let head_tree = self.load_head_tree()?;
        let mut changed_files =
            self.check_index_entries(&file_stats, &head_tree, index, &inspector)?;
        self.collect_deleted_head_files(&head_tree, index, &mut changed_files);
        let conflicts = Self::collect_conflicts(index);

        let workspace_changeset = changed_files
            .iter()
            .filter(|(_, change)| change.workspace_change != WorkspaceChangeType::None)
            .map(|(file, change)| {
                (
                    file.clone(),
                    FileChangeType::Workspace(change.workspace_change.clone()),
                )
            })
            .collect::<BTreeMap<_, _>>();
        let index_changeset = changed_files
            .iter()
            .filter(|(_, change)| change.index_change != IndexChangeType::None)
            .map(|(file, change)| {
                (
                    file.clone(),
                    FileChangeType::Index(change.index_change.clone()),
                )
            })
            .collect::<BTreeMap<_, _>>();

        Ok(StatusInfo {
            untracked_files,
            changed_files,
            conflicts,
            workspace_changeset,
            index_changeset,
        })
    }

    async fn scan_workspace(
        &self,
        prefix_path: Option<&Path>,
        untracked_files: &mut FileSet,
        file_stats: &mut FileStatSet,
        index: &Index,
        inspector: &Inspector<'_>,
    ) -> anyhow::Result<()> {
        let workspace = self.repository.workspace();
        let paths = workspace.list_dir(prefix_path)?;

        for path in paths.iter() {
            let is_dir = workspace.is_dir(path);

            if index.is_directly_tracked(path) {
                if is_dir {
                    Box::pin(self.scan_workspace(
                        Some(path),
                        untracked_files,
                        file_stats,
                        index,
                        inspector,
                    ))
                    .await?;
                } else {
                    file_stats.insert(path.clone(), workspace.stat_file(path)?);
                }
            } else if inspector.is_untracked(path, index)? {
                let mut path = path.clone();
                if is_dir {
                    path.push("");
                }
                untracked_files.insert(path);
            }
        }

        Ok(())
    }

    fn load_head_tree(&self) -> anyhow::Result<HeadTree> {
        let head = self.repository.refs().head()?;

        self.repository.database().flatten_tree(head.oid())
    }

    fn check_index_entries(
        &self,
        file_stats: &FileStatSet,
        head_tree: &HeadTree,
        index: &mut Index,
        inspector: &Inspector<'_>,
    ) -> anyhow::Result<BTreeMap<PathBuf, FileChange>> {
        let mut changed_files = BTreeMap::<PathBuf, FileChange>::new();
        // conflicted paths are reported separately
        let index_entries = index
            .entries()
            .filter(|entry| entry.stage == Stage::Merged)
            .cloned()
            .collect::<Vec<_>>();

        for entry in index_entries {
            self.check_index_entry_against_workspace(
                &entry,
                file_stats,
                index,
                inspector,
                &mut changed_files,
            )?;

            let change =
                inspector.check_index_against_head_tree(Some(&entry), head_tree.get(&entry.name));
            if change != IndexChangeType::None {
                changed_files
                    .entry(entry.name.clone())
                    .or_default()
                    .index_change = change;
            }
        }

        Ok(changed_files)
    }

    fn check_index_entry_against_workspace(
        &self,
        index_entry: &IndexEntry,
        file_stats: &FileStatSet,
        index: &mut Index,
        inspector: &Inspector<'_>,
        changed_files: &mut BTreeMap<PathBuf, FileChange>,
    ) -> anyhow::Result<()> {
        let stat = file_stats.get(&index_entry.name);
        let status = inspector.check_index_against_workspace(Some(index_entry), stat)?;

        if status != WorkspaceChangeType::None {
            changed_files
                .entry(index_entry.name.clone())
                .or_default()
                .workspace_change = status;
        } else if let Some(stat) = stat
            && !index_entry.times_match(stat)
        {
            index.update_entry_stat(&index_entry.name, stat.clone());
        }

        Ok(())
    }

    fn collect_deleted_head_files(
        &self,
        head_tree: &HeadTree,
        index: &Index,
        changed_files: &mut BTreeMap<PathBuf, FileChange>,
    ) {
        for path in head_tree.keys() {
            if !index.is_tracked_file(path) {
                changed_files.entry(path.clone()).or_default().index_change =
                    IndexChangeType::Deleted;
            }
        }
    }

    fn collect_conflicts(index: &Index) -> BTreeMap<PathBuf, ConflictStatus> {
        index
            .conflicted_paths()
            .into_iter()
            .map(|path| {
                let stages = index
                    .conflict_entries(&path)
                    .iter()
                    .map(|entry| entry.stage)
                    .collect::<Vec<_>>();
                let status = ConflictStatus::from_stages(
                    stages.contains(&Stage::Base),
                    stages.contains(&Stage::Ours),
                    stages.contains(&Stage::Theirs),
                );
                (path, status)
            })
            .collect()
    }
}
