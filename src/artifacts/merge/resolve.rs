//! Three-way resolution
//!
//! Trees are compared file by file. For each path present in the base, our
//! tip or their tip:
//!
//! | ours vs theirs | ours vs base | theirs vs base | result          |
//! |----------------|--------------|----------------|-----------------|
//! | same           | any          | any            | take it         |
//! | differ         | same         | changed        | take theirs     |
//! | differ         | changed      | same           | take ours       |
//! | differ         | changed      | changed        | conflict        |
//!
//! "Same" compares both blob id and mode; an absent side compares equal only
//! to another absent side.

use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::status::file_change::ConflictStatus;
use std::collections::BTreeMap;
use std::path::PathBuf;

pub type FlatTree = BTreeMap<PathBuf, DatabaseEntry>;

/// The three versions of a path both sides changed differently
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathConflict {
    pub base: Option<DatabaseEntry>,
    pub ours: Option<DatabaseEntry>,
    pub theirs: Option<DatabaseEntry>,
}

impl PathConflict {
    pub fn status(&self) -> ConflictStatus {
        ConflictStatus::from_stages(
            self.base.is_some(),
            self.ours.is_some(),
            self.theirs.is_some(),
        )
    }

    /// Whether both sides still have content, so markers can be written
    pub fn is_content_conflict(&self) -> bool {
        self.ours.is_some() && self.theirs.is_some()
    }

    /// What the working tree holds until the conflict is resolved: our
    /// version, or theirs when we deleted the path
    pub fn surviving_entry(&self) -> Option<&DatabaseEntry> {
        self.ours.as_ref().or(self.theirs.as_ref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Take(Option<DatabaseEntry>),
    Conflict(PathConflict),
}

pub fn resolve_path(
    base: Option<&DatabaseEntry>,
    ours: Option<&DatabaseEntry>,
    theirs: Option<&DatabaseEntry>,
) -> Resolution {
    if ours == theirs {
        return Resolution::Take(ours.cloned());
    }
    if ours == base {
        return Resolution::Take(theirs.cloned());
    }
    if theirs == base {
        return Resolution::Take(ours.cloned());
    }

    Resolution::Conflict(PathConflict {
        base: base.cloned(),
        ours: ours.cloned(),
        theirs: theirs.cloned(),
    })
}

/// Result of merging three flattened trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    /// Cleanly resolved files
    pub merged: FlatTree,
    pub conflicts: BTreeMap<PathBuf, PathConflict>,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// The tree the working directory should show after the merge
    pub fn workspace_tree(&self) -> FlatTree {
        let mut tree = self.merged.clone();
        for (path, conflict) in &self.conflicts {
            if let Some(entry) = conflict.surviving_entry() {
                tree.insert(path.clone(), entry.clone());
            }
        }
        tree
    }

    pub fn conflicted_paths(&self) -> Vec<PathBuf> {
        self.conflicts.keys().cloned().collect()
    }
}

pub fn three_way(base: &FlatTree, ours: &FlatTree, theirs: &FlatTree) -> MergeOutcome {
    let mut paths = base.keys().chain(ours.keys()).chain(theirs.keys()).collect::<Vec<_>>();
    paths.sort();
    paths.dedup();

    let mut outcome = MergeOutcome::default();

    for path in paths {
        match resolve_path(base.get(path), ours.get(path), theirs.get(path)) {
            Resolution::Take(Some(entry)) => {
                outcome.merged.insert(path.clone(), entry);
            }
            Resolution::Take(None) => {}
            Resolution::Conflict(conflict) => {
                debug_log!("Conflict in {}: {:?}", path.display(), conflict.status());
                outcome.conflicts.insert(path.clone(), conflict);
            }
        }
    }

    outcome
}

/// Working tree content for a path both sides modified
pub fn conflict_markers(ours: &[u8], theirs: &[u8], their_label: &str) -> Vec<u8> {
    let mut content = Vec::with_capacity(ours.len() + theirs.len() + 64);

    content.extend_from_slice(b"<<<<<<< HEAD\n");
    push_section(&mut content, ours);
    content.extend_from_slice(b"=======\n");
    push_section(&mut content, theirs);
    content.extend_from_slice(format!(">>>>>>> {their_label}\n").as_bytes());

    content
}

fn push_section(content: &mut Vec<u8>, section: &[u8]) {
    content.extend_from_slice(section);
    if !section.is_empty() && !section.ends_with(b"\n") {
        content.push(b'\n');
    }
}

/// 1-based inclusive line ranges where two texts differ, compared line by
/// line at equal positions; `None` when either side is not UTF-8
pub fn differing_line_ranges(ours: &[u8], theirs: &[u8]) -> Option<Vec<(usize, usize)>> {
    let ours = std::str::from_utf8(ours).ok()?.lines().collect::<Vec<_>>();
    let theirs = std::str::from_utf8(theirs).ok()?.lines().collect::<Vec<_>>();
    let line_count = ours.len().max(theirs.len());

    let mut ranges = Vec::new();
    let mut start = None;

    for line in 0..line_count {
        let differs = ours.get(line) != theirs.get(line);
        match (differs, start) {
            (true, None) => start = Some(line + 1),
            (false, Some(first)) => {
                ranges.push((first, line));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(first) = start {
        ranges.push((first, line_count));
    }

    Some(ranges)
}
