use crate::artifacts::database::database_entry::DatabaseEntry;
use crate::artifacts::index::index_entry::{EntryMetadata, IndexEntry};

#[derive(Debug)]
pub struct ConflictMessage {
    pub header: &'static str,
    pub footer: &'static str,
}

impl From<&ConflictType> for ConflictMessage {
    fn from(value: &ConflictType) -> Self {
        match value {
            ConflictType::StaleFile => Self {
                header: "Your local changes to the following files would be overwritten:",
                footer: "Please commit your changes before you switch branches or merge.",
            },
            ConflictType::StaleDirectory => Self {
                header: "Updating the following directories would lose untracked files in them:",
                footer: "Please move or remove them first.",
            },
            ConflictType::UntrackedOverwritten => Self {
                header: "The following untracked working tree files would be overwritten:",
                footer: "Please move or remove them first.",
            },
            ConflictType::UntrackedRemoved => Self {
                header: "The following untracked working tree files would be removed:",
                footer: "Please move or remove them first.",
            },
        }
    }
}

/// Why a planned working tree update would lose local data
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConflictType {
    StaleFile,
    StaleDirectory,
    UntrackedOverwritten,
    UntrackedRemoved,
}

impl ConflictType {
    pub fn get_conflict_type(
        stat: Option<&EntryMetadata>,
        entry: Option<&IndexEntry>,
        new_entry: Option<&DatabaseEntry>,
    ) -> ConflictType {
        if entry.is_some() {
            ConflictType::StaleFile
        } else if let Some(stat) = stat
            && stat.mode.is_tree()
        {
            ConflictType::StaleDirectory
        } else if new_entry.is_some() {
            ConflictType::UntrackedOverwritten
        } else {
            ConflictType::UntrackedRemoved
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::index::entry_mode::EntryMode;
    use crate::artifacts::objects::object_id::ObjectId;
    use rstest::rstest;
    use std::path::PathBuf;

    fn file_stat() -> EntryMetadata {
        EntryMetadata::default()
    }

    fn dir_stat() -> EntryMetadata {
        EntryMetadata {
            mode: EntryMode::Directory,
            ..Default::default()
        }
    }

    #[rstest]
    #[case(Some(file_stat()), true, true, ConflictType::StaleFile)]
    #[case(Some(dir_stat()), false, true, ConflictType::StaleDirectory)]
    #[case(Some(file_stat()), false, true, ConflictType::UntrackedOverwritten)]
    #[case(Some(file_stat()), false, false, ConflictType::UntrackedRemoved)]
    fn conflict_kind_follows_what_is_in_the_way(
        #[case] stat: Option<EntryMetadata>,
        #[case] tracked: bool,
        #[case] incoming: bool,
        #[case] expected: ConflictType,
    ) {
        let oid = ObjectId::hash_bytes(b"x");
        let entry = tracked.then(|| IndexEntry::new(PathBuf::from("x"), oid.clone(), file_stat()));
        let new_entry = incoming.then(|| DatabaseEntry::new(oid.clone(), EntryMode::default()));

        assert_eq!(
            ConflictType::get_conflict_type(stat.as_ref(), entry.as_ref(), new_entry.as_ref()),
            expected
        );
    }
}
