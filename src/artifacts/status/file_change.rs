use colored::Colorize;

const LABEL_WIDTH: usize = 8;

/// Index versus working tree
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum WorkspaceChangeType {
    #[default]
    None,
    Untracked,
    Modified,
    Deleted,
}

impl From<&WorkspaceChangeType> for &str {
    fn from(change: &WorkspaceChangeType) -> Self {
        match change {
            WorkspaceChangeType::None => " ",
            WorkspaceChangeType::Untracked => "??",
            WorkspaceChangeType::Modified => "M",
            WorkspaceChangeType::Deleted => "D",
        }
    }
}

/// HEAD tree versus index
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum IndexChangeType {
    #[default]
    None,
    Added,
    Modified,
    Deleted,
}

impl From<&IndexChangeType> for &str {
    fn from(change: &IndexChangeType) -> Self {
        match change {
            IndexChangeType::None => " ",
            IndexChangeType::Added => "A",
            IndexChangeType::Modified => "M",
            IndexChangeType::Deleted => "D",
        }
    }
}

/// Shape of an unresolved merge conflict, from the stages the index holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConflictStatus {
    BothModified,
    BothAdded,
    DeletedByUs,
    DeletedByThem,
}

impl ConflictStatus {
    pub fn from_stages(base: bool, ours: bool, theirs: bool) -> Self {
        match (base, ours, theirs) {
            (false, _, _) => ConflictStatus::BothAdded,
            (true, false, true) => ConflictStatus::DeletedByUs,
            (true, true, false) => ConflictStatus::DeletedByThem,
            (true, _, _) => ConflictStatus::BothModified,
        }
    }

    pub fn porcelain_code(&self) -> &'static str {
        match self {
            ConflictStatus::BothModified => "UU",
            ConflictStatus::BothAdded => "AA",
            ConflictStatus::DeletedByUs => "DU",
            ConflictStatus::DeletedByThem => "UD",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ConflictStatus::BothModified => "both modified:   ",
            ConflictStatus::BothAdded => "both added:      ",
            ConflictStatus::DeletedByUs => "deleted by us:   ",
            ConflictStatus::DeletedByThem => "deleted by them: ",
        }
    }
}

impl std::fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:>width$}{}", "", self.label().red(), width = LABEL_WIDTH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileChangeType {
    Workspace(WorkspaceChangeType),
    Index(IndexChangeType),
}

impl From<&FileChangeType> for &str {
    fn from(change: &FileChangeType) -> Self {
        match change {
            FileChangeType::Workspace(workspace_change) => match workspace_change {
                WorkspaceChangeType::None | WorkspaceChangeType::Untracked => "",
                WorkspaceChangeType::Modified => "modified:   ",
                WorkspaceChangeType::Deleted => "deleted:    ",
            },
            FileChangeType::Index(index_change) => match index_change {
                IndexChangeType::None => "",
                IndexChangeType::Added => "new file:   ",
                IndexChangeType::Modified => "modified:   ",
                IndexChangeType::Deleted => "deleted:    ",
            },
        }
    }
}

impl std::fmt::Display for FileChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label: &str = self.into();
        let colored_str = match self {
            FileChangeType::Workspace(_) => label.red(),
            FileChangeType::Index(_) => label.green(),
        };
        write!(f, "{:>width$}{}", "", colored_str, width = LABEL_WIDTH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct FileChange {
    pub(crate) workspace_change: WorkspaceChangeType,
    pub(crate) index_change: IndexChangeType,
}

impl From<&FileChange> for String {
    fn from(change: &FileChange) -> Self {
        let index_str: &str = (&change.index_change).into();
        let workspace_str: &str = (&change.workspace_change).into();
        format!("{index_str}{workspace_str}")
    }
}

impl std::fmt::Display for FileChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let change_str: String = self.into();
        write!(f, "{change_str}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(IndexChangeType::Added, WorkspaceChangeType::None, "A ")]
    #[case(IndexChangeType::Modified, WorkspaceChangeType::Modified, "MM")]
    #[case(IndexChangeType::None, WorkspaceChangeType::Deleted, " D")]
    fn porcelain_pairs_index_then_workspace(
        #[case] index_change: IndexChangeType,
        #[case] workspace_change: WorkspaceChangeType,
        #[case] expected: &str,
    ) {
        let change = FileChange {
            workspace_change,
            index_change,
        };

        assert_eq!(change.to_string(), expected);
    }

    #[rstest]
    #[case(true, true, true, ConflictStatus::BothModified, "UU")]
    #[case(false, true, true, ConflictStatus::BothAdded, "AA")]
    #[case(true, false, true, ConflictStatus::DeletedByUs, "DU")]
    #[case(true, true, false, ConflictStatus::DeletedByThem, "UD")]
    fn conflict_shape_follows_present_stages(
        #[case] base: bool,
        #[case] ours: bool,
        #[case] theirs: bool,
        #[case] expected: ConflictStatus,
        #[case] code: &str,
    ) {
        let status = ConflictStatus::from_stages(base, ours, theirs);

        assert_eq!(status, expected);
        assert_eq!(status.porcelain_code(), code);
    }
}
