//! Working tree migration and conflict detection
//!
//! A migration turns the working tree and the index from one tree into
//! another. The change set is computed by the caller (a tree diff for
//! checkout, a flattened comparison for merge and abort).
//!
//! ## Conflict Detection
//!
//! - Stale files: the index or the working copy differs from both trees
//! - Stale directories: a directory with untracked files is in the way
//! - Untracked overwrites: an untracked file sits where a file is coming
//! - Untracked removals: an untracked file sits where a file is going away
//!
//! All conflicts are collected before anything is written.

use crate::areas::index::Index;
use crate::areas::repository::Repository;
use crate::artifacts::checkout::conflict::{ConflictMessage, ConflictType};
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::diff::tree_diff::{ChangeSet, TreeChangeType};
use crate::artifacts::index::index_entry::IndexEntry;
use crate::artifacts::objects::object::Object;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::{IndexChangeType, WorkspaceChangeType};
use crate::artifacts::status::inspector::Inspector;
use anyhow::Context;
use bytes::Bytes;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionType {
    Add,
    Delete,
    Modify,
}

pub type ActionsSet = HashMap<ActionType, Vec<(PathBuf, Option<DatabaseEntry>)>>;

pub type ConflictsSet = BTreeMap<ConflictType, BTreeSet<PathBuf>>;

pub struct Migration<'r> {
    repository: &'r Repository,
    index: &'r mut Index,
    changes: ChangeSet,
    inspector: Inspector<'r>,
    actions: ActionsSet,
    conflicts: ConflictsSet,
}

impl<'r> Migration<'r> {
    pub fn new(repository: &'r Repository, index: &'r mut Index, changes: ChangeSet) -> Self {
        Self {
            repository,
            index,
            changes,
            inspector: Inspector::new(repository.workspace()),
            actions: HashMap::new(),
            conflicts: BTreeMap::new(),
        }
    }

    pub fn actions(&self, action: ActionType) -> &[(PathBuf, Option<DatabaseEntry>)] {
        self.actions
            .get(&action)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Check, then rewrite the working tree and the index
    ///
    /// Fails with `UncommittedChanges` (and touches nothing) if local data
    /// would be lost. The index is updated in memory only.
    pub fn apply_changes(&mut self) -> anyhow::Result<()> {
        self.plan_changes()?;
        self.repository.workspace().apply_migration(self)?;
        self.update_index()
    }

    fn plan_changes(&mut self) -> anyhow::Result<()> {
        let changes = std::mem::take(&mut self.changes);

        for (path, change) in &changes {
            self.check_for_conflict(path, change)?;
            self.record_change(path, change);
        }
        self.changes = changes;

        if self.conflicts.values().all(BTreeSet::is_empty) {
            return Ok(());
        }

        for (conflict_type, paths) in &self.conflicts {
            let ConflictMessage { header, footer } = conflict_type.into();
            eprintln!("error: {header}");
            for path in paths {
                eprintln!("\t{}", path.display());
            }
            eprintln!("{footer}");
        }

        let paths = self
            .conflicts
            .values()
            .flatten()
            .cloned()
            .collect::<BTreeSet<_>>();
        Err(RepositoryError::UncommittedChanges(paths.into_iter().collect()).into())
    }

    fn record_conflict(&mut self, conflict_type: ConflictType, path: &Path) {
        self.conflicts
            .entry(conflict_type)
            .or_default()
            .insert(path.to_path_buf());
    }

    fn check_for_conflict(&mut self, path: &Path, change: &TreeChangeType) -> anyhow::Result<()> {
        let (old_entry, new_entry) = (change.old_entry(), change.new_entry());

        if !self.index.conflict_entries(path).is_empty()
            || self.index_differs_from_trees(path, old_entry, new_entry)
        {
            self.record_conflict(ConflictType::StaleFile, path);
            return Ok(());
        }

        let entry = self.index.entry_by_path(path).cloned();
        let stat = self.repository.workspace().stat_file(path).ok();
        let conflict_type =
            ConflictType::get_conflict_type(stat.as_ref(), entry.as_ref(), new_entry);

        match &stat {
            Some(stat) if stat.mode.is_tree() => {
                if self.inspector.has_untracked_files(path, self.index)? {
                    self.record_conflict(conflict_type, path);
                }
            }
            Some(stat) => {
                // a working copy already equal to the target is harmless
                if let Some(new_entry) = new_entry
                    && entry.is_none()
                    && self.workspace_matches(path, new_entry)?
                {
                    return Ok(());
                }

                if self
                    .inspector
                    .check_index_against_workspace(entry.as_ref(), Some(stat))?
                    != WorkspaceChangeType::None
                {
                    self.record_conflict(conflict_type, path);
                }
            }
            None => {
                if new_entry.is_some()
                    && let Some(parent) = self.untracked_parent(path)
                {
                    self.record_conflict(ConflictType::UntrackedOverwritten, &parent);
                }
            }
        }

        Ok(())
    }

    fn workspace_matches(&self, path: &Path, entry: &DatabaseEntry) -> anyhow::Result<bool> {
        let blob = self.repository.workspace().parse_blob(path)?;
        Ok(blob.object_id()? == entry.oid)
    }

    /// The nearest ancestor that is an untracked file rather than a directory
    fn untracked_parent(&self, path: &Path) -> Option<PathBuf> {
        path.ancestors()
            .skip(1)
            .filter(|parent| !parent.as_os_str().is_empty())
            .find(|parent| {
                let workspace = self.repository.workspace();
                workspace.exists(parent)
                    && !workspace.is_dir(parent)
                    && !self.index.is_tracked_file(parent)
            })
            .map(Path::to_path_buf)
    }

    fn index_differs_from_trees(
        &self,
        path: &Path,
        old_entry: Option<&DatabaseEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> bool {
        let index_entry = self.index.entry_by_path(path);

        self.inspector
            .check_index_against_head_tree(index_entry, old_entry)
            != IndexChangeType::None
            && self
                .inspector
                .check_index_against_head_tree(index_entry, new_entry)
                != IndexChangeType::None
    }

    fn record_change(&mut self, path: &Path, change: &TreeChangeType) {
        let (action, entry) = match change {
            TreeChangeType::Added(new_entry) => (ActionType::Add, Some(new_entry.clone())),
            TreeChangeType::Deleted(_) => (ActionType::Delete, None),
            TreeChangeType::Modified { new, .. } => (ActionType::Modify, Some(new.clone())),
        };

        self.actions
            .entry(action)
            .or_default()
            .push((path.to_path_buf(), entry));
    }

    fn update_index(&mut self) -> anyhow::Result<()> {
        for (file_path, _) in self.actions(ActionType::Delete).to_vec() {
            self.index.remove(&file_path);
        }

        for action in [ActionType::Add, ActionType::Modify] {
            for (file_path, entry) in self.actions(action).to_vec() {
                let entry = entry
                    .with_context(|| format!("no target entry for {}", file_path.display()))?;
                let mut stat = self.repository.workspace().stat_file(&file_path)?;
                stat.mode = entry.mode;

                self.index.stage(IndexEntry::new(file_path, entry.oid, stat));
            }
        }

        Ok(())
    }

    pub fn load_blob_data(&self, object_id: &ObjectId) -> anyhow::Result<Bytes> {
        self.repository.database().load_blob_content(object_id)
    }
}
