use crate::areas::index::Index;
use crate::areas::refs::Head;
use crate::areas::repository::Repository;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::diff::tree_diff::diff_flat;
use crate::artifacts::index::index_entry::{IndexEntry, Stage};
use crate::artifacts::merge::merge_base::CommitGraph;
use crate::artifacts::merge::resolve::{
    MergeOutcome, PathConflict, conflict_markers, differing_line_ranges, three_way,
};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::status::file_change::ConflictStatus;
use std::collections::BTreeSet;
use std::path::Path;

/// What the merge has to do once both tips are known
#[derive(Debug, Clone, PartialEq, Eq)]
enum MergePlan {
    UpToDate,
    FastForward,
    /// `base` is `None` for histories that only meet in the empty tree
    ThreeWay { base: Option<ObjectId> },
}

impl Repository {
    /// Merge `target` into the current branch
    ///
    /// Fast-forwards when HEAD is an ancestor of the target. Otherwise the
    /// trees are merged file by file against the best common ancestor, or
    /// the empty tree for root histories that share paths: a clean result is committed with both tips as parents, conflicts are
    /// left in the index and the working tree for the user to resolve.
    pub async fn merge(&mut self, target: &str, message: Option<&str>) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let head = self.refs().head()?;
        let Head::Branch { name: current_branch, oid } = &head else {
            return Err(RepositoryError::DetachedHead("merge").into());
        };
        let ours = oid
            .clone()
            .ok_or_else(|| RepositoryError::UnbornHead(current_branch.to_string()))?;

        self.ensure_no_merge_in_progress().await?;

        let theirs = Revision::parse(target, self.refs())?.resolve(self.refs(), self.database())?;

        self.ensure_clean_tree().await?;

        match self.plan_merge(&ours, &theirs)? {
            MergePlan::UpToDate => {
                writeln!(self.writer(), "Already up to date.")?;
                Ok(())
            }
            MergePlan::FastForward => self.fast_forward(&ours, &theirs).await,
            MergePlan::ThreeWay { base } => {
                let message = message.map(str::to_string).unwrap_or_else(|| {
                    format!("Merge branch '{target}' into {current_branch}")
                });

                self.three_way_merge(base.as_ref(), &ours, &theirs, target, message)
                    .await
            }
        }
    }

    /// Throw away a conflicted merge: the index and the tracked files go
    /// back to the commit HEAD was on before the merge started
    pub async fn merge_abort(&mut self) -> anyhow::Result<()> {
        let _lock = self.lock()?;

        let merge_state = self.merge_state();
        let orig_head = merge_state.orig_head()?;

        self.hard_reset(&orig_head).await?;
        merge_state.clear()?;

        Ok(())
    }

    fn plan_merge(&self, ours: &ObjectId, theirs: &ObjectId) -> anyhow::Result<MergePlan> {
        let graph = CommitGraph::new(|oid: &ObjectId| self.database().load_slim_commit(oid));

        if graph.is_ancestor(theirs, ours)? {
            return Ok(MergePlan::UpToDate);
        }
        if graph.is_ancestor(ours, theirs)? {
            return Ok(MergePlan::FastForward);
        }

        let base = match graph.merge_base(ours, theirs)? {
            Some(base) => Some(base),
            None if self.share_paths(ours, theirs)? => None,
            None => return Err(RepositoryError::UnrelatedHistories.into()),
        };

        Ok(MergePlan::ThreeWay { base })
    }

    /// Root commits of one project start from the same empty tree; histories
    /// without a single path in common are taken as separate projects
    fn share_paths(&self, ours: &ObjectId, theirs: &ObjectId) -> anyhow::Result<bool> {
        let ours_tree = self.database().flatten_tree(Some(ours))?;
        let theirs_tree = self.database().flatten_tree(Some(theirs))?;

        Ok(ours_tree.keys().any(|path| theirs_tree.contains_key(path)))
    }

    async fn ensure_clean_tree(&self) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let status = self.tree_status().initialize(&mut index).await?;
        index.write_updates()?;

        if status.is_clean() {
            return Ok(());
        }

        let dirty_paths = status.dirty_paths();
        eprintln!("error: your local changes would be overwritten by merge:");
        for path in &dirty_paths {
            eprintln!("\t{}", path.display());
        }
        eprintln!("Please commit your changes before you merge.");

        Err(RepositoryError::UncommittedChanges(dirty_paths).into())
    }

    async fn fast_forward(&self, ours: &ObjectId, theirs: &ObjectId) -> anyhow::Result<()> {
        self.migrate_to(Some(ours), theirs).await?;
        self.refs().update_head(theirs)?;

        writeln!(
            self.writer(),
            "Updating {}..{}\nFast-forward",
            ours.to_short_oid(),
            theirs.to_short_oid()
        )?;

        Ok(())
    }

    async fn three_way_merge(
        &self,
        base: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
        their_label: &str,
        message: String,
    ) -> anyhow::Result<()> {
        let base_tree = self.database().flatten_tree(base)?;
        let ours_tree = self.database().flatten_tree(Some(ours))?;
        let theirs_tree = self.database().flatten_tree(Some(theirs))?;

        let outcome = three_way(&base_tree, &ours_tree, &theirs_tree);

        let tree_oid = {
            let index = self.index();
            let mut index = index.lock().await;
            index.rehydrate()?;

            let changes = diff_flat(&ours_tree, &outcome.workspace_tree());
            Migration::new(self, &mut index, changes).apply_changes()?;

            for (path, conflict) in &outcome.conflicts {
                self.record_conflict(&mut index, path, conflict, their_label)?;
            }
            index.write_updates()?;

            if outcome.is_clean() {
                Some(index.materialize_as_tree(self.database())?)
            } else {
                None
            }
        };

        let Some(tree_oid) = tree_oid else {
            return self.stop_on_conflicts(&outcome, ours, theirs, &message);
        };

        let commit_oid = self.write_commit(vec![ours.clone(), theirs.clone()], tree_oid, message)?;
        writeln!(
            self.writer(),
            "Merge made by the 'three-way' strategy. [{}]",
            commit_oid.to_short_oid()
        )?;

        Ok(())
    }

    /// Stage the sides of a conflicted path and put something the user can
    /// edit into the working tree
    fn record_conflict(
        &self,
        index: &mut Index,
        path: &Path,
        conflict: &PathConflict,
        their_label: &str,
    ) -> anyhow::Result<()> {
        let stages = [
            (Stage::Base, &conflict.base),
            (Stage::Ours, &conflict.ours),
            (Stage::Theirs, &conflict.theirs),
        ];
        let entries = stages
            .into_iter()
            .filter_map(|(stage, entry)| {
                entry.as_ref().map(|entry| {
                    IndexEntry::conflicted(path.to_path_buf(), entry.oid.clone(), entry.mode, stage)
                })
            })
            .collect::<Vec<_>>();
        index.add_conflict(entries);

        match (&conflict.ours, &conflict.theirs) {
            (Some(ours), Some(theirs)) => {
                let ours_data = self.database().load_blob_content(&ours.oid)?;
                let theirs_data = self.database().load_blob_content(&theirs.oid)?;

                let content = conflict_markers(&ours_data, &theirs_data, their_label);
                self.workspace().write_file(path, &content, ours.mode)?;

                writeln!(self.writer(), "Auto-merging {}", path.display())?;
                let kind = match conflict.status() {
                    ConflictStatus::BothAdded => "add/add",
                    _ => "content",
                };
                match differing_line_ranges(&ours_data, &theirs_data) {
                    Some(ranges) if !ranges.is_empty() => eprintln!(
                        "CONFLICT ({kind}): Merge conflict in {}: {}",
                        path.display(),
                        format_line_ranges(&ranges)
                    ),
                    _ => eprintln!("CONFLICT ({kind}): Merge conflict in {}", path.display()),
                }
            }
            (Some(_), None) => eprintln!(
                "CONFLICT (modify/delete): {path} deleted in {their_label} and modified in HEAD. \
                 Version HEAD of {path} left in tree.",
                path = path.display()
            ),
            (None, Some(_)) => eprintln!(
                "CONFLICT (modify/delete): {path} deleted in HEAD and modified in {their_label}. \
                 Version {their_label} of {path} left in tree.",
                path = path.display()
            ),
            (None, None) => {}
        }

        Ok(())
    }

    fn stop_on_conflicts(
        &self,
        outcome: &MergeOutcome,
        ours: &ObjectId,
        theirs: &ObjectId,
        message: &str,
    ) -> anyhow::Result<()> {
        self.merge_state().start(theirs, ours, message)?;

        eprintln!("Automatic merge failed; fix conflicts and then commit the result.");

        Err(RepositoryError::MergeConflict(outcome.conflicted_paths()).into())
    }

    /// Make the index and the tracked files match a commit; untracked files
    /// are left alone
    async fn hard_reset(&self, oid: &ObjectId) -> anyhow::Result<()> {
        let target = self.database().flatten_tree(Some(oid))?;

        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let tracked = index
            .entries()
            .map(|entry| entry.name.clone())
            .collect::<BTreeSet<_>>();
        for path in tracked.iter().filter(|path| !target.contains_key(*path)) {
            self.workspace().remove_file(path)?;
        }

        index.clear();
        for (path, entry) in &target {
            let data = self.database().load_blob_content(&entry.oid)?;
            self.workspace().write_file(path, &data, entry.mode)?;

            let stat = self.workspace().stat_file(path)?;
            index.stage(IndexEntry::new(path.clone(), entry.oid.clone(), stat));
        }

        index.write_updates()
    }
}

/// `1` for a single line, `[3, 5]` for a run, comma separated
fn format_line_ranges(ranges: &[(usize, usize)]) -> String {
    ranges
        .iter()
        .map(|&(start, end)| {
            if start == end {
                start.to_string()
            } else {
                format!("[{start}, {end}]")
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
