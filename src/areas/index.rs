//! Staging area
//!
//! The index tracks the content the next commit will contain. It is loaded
//! from `.mygit/index`, changed in memory and written back as a whole.
//!
//! ## Data Structures
//!
//! - `entries`: entries keyed by `(path, stage)`; a path is either staged at
//!   stage 0 or conflicted with entries at stages 1-3
//! - `children`: directory path to the tracked paths below it, so that a file
//!   replacing a directory (or the other way round) evicts the stale entries

use crate::areas::database::Database;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::index::checksum::Checksum;
use crate::artifacts::index::index_entry::{
    ENTRY_BLOCK, ENTRY_MIN_SIZE, EntryMetadata, IndexEntry, Stage,
};
use crate::artifacts::index::index_header::IndexHeader;
use crate::artifacts::index::HEADER_SIZE;
use crate::artifacts::objects::object::{Object, Packable, Unpackable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::Tree;
use anyhow::Context;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::DerefMut;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Index {
    /// Path to the index file (`.mygit/index`)
    path: Box<Path>,
    entries: BTreeMap<(PathBuf, Stage), IndexEntry>,
    children: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    /// Set whenever the in-memory state diverges from the file
    changed: bool,
}

impl Index {
    pub fn new(path: Box<Path>) -> Self {
        Index {
            path,
            entries: BTreeMap::new(),
            children: BTreeMap::new(),
            changed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Drop every entry; the next write produces an empty index
    pub fn clear(&mut self) {
        self.entries.clear();
        self.children.clear();
        self.changed = true;
    }

    /// Load the index from disk, replacing the in-memory state
    ///
    /// A missing index file is an empty index.
    pub fn rehydrate(&mut self) -> anyhow::Result<()> {
        self.entries.clear();
        self.children.clear();
        self.changed = false;

        if !self.path.exists() {
            return Ok(());
        }

        let mut index_file = std::fs::OpenOptions::new()
            .read(true)
            .open(self.path())
            .with_context(|| format!("unable to open index file {}", self.path.display()))?;
        let mut lock = file_guard::lock(&mut index_file, file_guard::Lock::Shared, 0, 1)?;

        if lock.deref_mut().metadata()?.len() == 0 {
            return Ok(());
        }

        let mut reader = Checksum::new(lock);
        let entries_count = self.parse_header(&mut reader)?;
        self.parse_entries(entries_count, &mut reader)?;

        reader
            .verify()
            .with_context(|| format!("corrupt index file {}", self.path.display()))
    }

    fn parse_header(&self, reader: &mut Checksum) -> anyhow::Result<u32> {
        let header_bytes = reader.read(HEADER_SIZE)?;
        let header = IndexHeader::deserialize(std::io::Cursor::new(header_bytes))?;
        header.validate()?;

        Ok(header.entries_count)
    }

    fn parse_entries(&mut self, entries_count: u32, reader: &mut Checksum) -> anyhow::Result<()> {
        for _ in 0..entries_count {
            let mut entry_bytes = reader.read(ENTRY_MIN_SIZE)?.to_vec();

            // names are NUL padded to the block size, so an entry ends with
            // the first block whose last byte is zero
            while entry_bytes.last() != Some(&0) {
                entry_bytes.extend_from_slice(&reader.read(ENTRY_BLOCK)?);
            }

            let entry = IndexEntry::deserialize(std::io::Cursor::new(entry_bytes))?;
            self.store_entry(entry);
        }

        Ok(())
    }

    /// Persist the index if anything changed
    ///
    /// The new content is written to `index.lock` and renamed over the index.
    pub fn write_updates(&mut self) -> anyhow::Result<()> {
        if !self.changed {
            return Ok(());
        }

        let temp_path = self.path.with_extension("lock");
        let mut index_file = std::fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("unable to open {}", temp_path.display()))?;

        {
            let lock = file_guard::try_lock(&mut index_file, file_guard::Lock::Exclusive, 0, 1)
                .map_err(|_| RepositoryError::RepositoryLocked(temp_path.clone()))?;
            let mut writer = Checksum::new(lock);

            let header = IndexHeader {
                entries_count: self.entries.len() as u32,
                ..IndexHeader::empty()
            };
            writer.write(&header.serialize()?)?;

            for entry in self.entries() {
                writer.write(&entry.serialize()?)?;
            }

            writer.write_checksum()?;
        }

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("unable to move {} into place", temp_path.display()))?;
        self.changed = false;

        Ok(())
    }

    /// Stage a path at stage 0
    ///
    /// Conflict stages of the path are dropped, as are entries whose path is a
    /// parent directory or a child of the new entry.
    pub fn stage(&mut self, entry: IndexEntry) {
        self.discard_conflicts(&entry.name);

        self.store_entry(IndexEntry {
            stage: Stage::Merged,
            ..entry
        });
        self.changed = true;
    }

    /// Record a conflicted path with one entry per side that has it
    pub fn add_conflict(&mut self, entries: Vec<IndexEntry>) {
        for entry in entries {
            if !self.entries.keys().any(|(path, stage)| path == &entry.name && stage.is_conflict()) {
                self.discard_conflicts(&entry.name);
            }
            self.store_entry(entry);
        }
        self.changed = true;
    }

    /// Untrack a path (all stages) or every path below a directory
    pub fn remove(&mut self, path: &Path) {
        self.remove_entry(path);
        self.remove_children(path);
        self.changed = true;
    }

    fn discard_conflicts(&mut self, name: &Path) {
        let parents = name
            .ancestors()
            .skip(1)
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .collect::<Vec<_>>();

        for parent in parents {
            self.remove_entry(&parent);
        }
        self.remove_entry(name);
        self.remove_children(name);
    }

    fn store_entry(&mut self, entry: IndexEntry) {
        for parent in entry.parent_dirs() {
            self.children
                .entry(parent.to_path_buf())
                .or_default()
                .insert(entry.name.clone());
        }

        self.entries
            .insert((entry.name.clone(), entry.stage), entry);
    }

    fn remove_children(&mut self, path: &Path) {
        if let Some(children) = self.children.remove(path) {
            for child in children {
                self.remove_entry(&child);
            }
        }
    }

    fn remove_entry(&mut self, path: &Path) {
        let keys = self
            .entries
            .range((path.to_path_buf(), Stage::Merged)..=(path.to_path_buf(), Stage::Theirs))
            .map(|(key, _)| key.clone())
            .collect::<Vec<_>>();
        if keys.is_empty() {
            return;
        }

        for key in keys {
            self.entries.remove(&key);
        }

        for parent in path.ancestors().skip(1) {
            if let Some(children) = self.children.get_mut(parent) {
                children.remove(path);
                if children.is_empty() {
                    self.children.remove(parent);
                }
            }
        }
    }

    pub fn update_entry_stat(&mut self, path: &Path, stat: EntryMetadata) {
        if let Some(existing_entry) = self.entries.get_mut(&(path.to_path_buf(), Stage::Merged)) {
            existing_entry.metadata = stat;
            self.changed = true;
        }
    }

    /// The stage 0 entry of a path
    pub fn entry_by_path(&self, path: &Path) -> Option<&IndexEntry> {
        self.entries.get(&(path.to_path_buf(), Stage::Merged))
    }

    /// Entries of a conflicted path, ordered base, ours, theirs
    pub fn conflict_entries(&self, path: &Path) -> Vec<&IndexEntry> {
        self.entries
            .range((path.to_path_buf(), Stage::Base)..=(path.to_path_buf(), Stage::Theirs))
            .map(|(_, entry)| entry)
            .collect()
    }

    /// All entries sorted by path, then stage
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    /// Whether the path is tracked at any stage
    pub fn is_tracked_file(&self, path: &Path) -> bool {
        self.entries
            .range((path.to_path_buf(), Stage::Merged)..=(path.to_path_buf(), Stage::Theirs))
            .next()
            .is_some()
    }

    /// Whether the path is a tracked file or a directory holding tracked files
    pub fn is_directly_tracked(&self, path: &Path) -> bool {
        self.is_tracked_file(path) || self.children.contains_key(path)
    }

    /// Distinct tracked paths equal to or below `path`
    pub fn entries_under_path(&self, path: &Path) -> Vec<PathBuf> {
        self.entries
            .keys()
            .map(|(entry_path, _)| entry_path)
            .filter(|entry_path| path == Path::new(".") || entry_path.starts_with(path))
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn has_conflicts(&self) -> bool {
        self.entries.keys().any(|(_, stage)| stage.is_conflict())
    }

    pub fn conflicted_paths(&self) -> Vec<PathBuf> {
        self.entries
            .keys()
            .filter(|(_, stage)| stage.is_conflict())
            .map(|(path, _)| path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Root tree id of the staged content, computed without storing anything
    ///
    /// Fails with `MergeConflict` while any path is still conflicted.
    pub fn tree_id(&self) -> anyhow::Result<ObjectId> {
        self.build_trees()?
            .last()
            .context("tree builder produced no root tree")?
            .object_id()
    }

    /// Store the staged content as nested trees and return the root tree id
    ///
    /// Fails with `MergeConflict` while any path is still conflicted.
    pub fn materialize_as_tree(&self, database: &Database) -> anyhow::Result<ObjectId> {
        let mut root = None;
        for tree in self.build_trees()? {
            root = Some(database.store(&tree)?);
        }

        root.context("tree builder produced no root tree")
    }

    fn build_trees(&self) -> anyhow::Result<Vec<Tree>> {
        if self.has_conflicts() {
            return Err(RepositoryError::MergeConflict(self.conflicted_paths()).into());
        }

        Tree::build(self.entries())
    }
}
