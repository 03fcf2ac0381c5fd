use crate::areas::refs::Head;
use crate::areas::repository::Repository;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::branch::revision::Revision;
use crate::artifacts::checkout::migration::Migration;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::objects::object_id::ObjectId;

const DETACHMENT_NOTICE: &str = r#"
You are in 'detached HEAD' state. You can look around, make experimental
changes and commit them, and you can discard any commits you make in this
state without impacting any branches by performing another checkout.

If you want to create a new branch to retain commits you create, you may
do so (now or later) by using the branch command. Example:

    mygit branch <new-branch-name>
"#;

impl Repository {
    /// Switch the working tree, the index and HEAD to a branch or commit
    ///
    /// Nothing is touched when the switch would overwrite local changes.
    /// Untracked files that are not in the way survive.
    pub async fn checkout(&mut self, target: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;
        self.ensure_no_merge_in_progress().await?;

        let head = self.refs().head()?;
        // the unborn branch HEAD points at has no ref file yet
        let revision = match head.branch_name() {
            Some(name) if head.oid().is_none() && name.as_ref() == target => {
                Revision::Branch(name.clone())
            }
            _ => Revision::parse(target, self.refs())?,
        };

        let target_oid = match &revision {
            Revision::Branch(name) => self.refs().read_branch(name)?,
            Revision::Head => head.oid().cloned(),
            Revision::Commit(_) => Some(revision.resolve(self.refs(), self.database())?),
        };

        if let Some(target_oid) = &target_oid {
            self.migrate_to(head.oid(), target_oid).await?;
        }

        match &revision {
            Revision::Branch(name) => self.refs().set_symbolic(name)?,
            Revision::Commit(oid) => self.refs().set_detached(oid)?,
            Revision::Head => {}
        }

        self.print_checkout_result(&head, &revision, target_oid.as_ref())
    }

    /// Create a branch at HEAD and switch to it
    ///
    /// On an unborn HEAD there is nothing to point the branch at, so it is
    /// recorded unborn and born with the next commit.
    pub async fn checkout_new_branch(&mut self, branch_name: &str) -> anyhow::Result<()> {
        let _lock = self.lock()?;
        self.ensure_no_merge_in_progress().await?;

        let branch_name = BranchName::try_parse(branch_name.to_string())?;
        if self.refs().branch_exists(&branch_name) {
            return Err(RepositoryError::RefAlreadyExists(branch_name.to_string()).into());
        }

        match self.refs().head()?.oid() {
            Some(head_oid) => self.refs().create(&branch_name, head_oid)?,
            None => self.refs().create_unborn(&branch_name)?,
        }
        self.refs().set_symbolic(&branch_name)?;

        eprintln!("Switched to a new branch '{branch_name}'");

        Ok(())
    }

    pub(crate) async fn migrate_to(
        &self,
        current_oid: Option<&ObjectId>,
        target_oid: &ObjectId,
    ) -> anyhow::Result<()> {
        let index = self.index();
        let mut index = index.lock().await;
        index.rehydrate()?;

        let tree_diff = self.database().tree_diff(current_oid, Some(target_oid))?;

        let mut migration = Migration::new(self, &mut index, tree_diff);
        migration.apply_changes()?;

        index.write_updates()
    }

    fn print_checkout_result(
        &self,
        previous: &Head,
        revision: &Revision,
        target_oid: Option<&ObjectId>,
    ) -> anyhow::Result<()> {
        match (revision, target_oid) {
            (Revision::Branch(name), _) if previous.branch_name() == Some(name) => {
                eprintln!("Already on '{name}'");
            }
            (Revision::Branch(name), _) => {
                if let Head::Detached(previous_oid) = previous {
                    self.print_head_position("Previous HEAD position was", previous_oid)?;
                }
                eprintln!("Switched to branch '{name}'");
            }
            (_, Some(target_oid)) => {
                if let Head::Detached(previous_oid) = previous {
                    if previous_oid != target_oid {
                        self.print_head_position("Previous HEAD position was", previous_oid)?;
                    }
                } else if matches!(revision, Revision::Commit(_)) {
                    eprintln!("Note: switching to '{revision}'.\n{DETACHMENT_NOTICE}");
                }
                self.print_head_position("HEAD is now at", target_oid)?;
            }
            (_, None) => {}
        }

        Ok(())
    }

    fn print_head_position(&self, message: &str, oid: &ObjectId) -> anyhow::Result<()> {
        let commit = self.database().load_commit(oid)?;

        eprintln!("{} {} {}", message, oid.to_short_oid(), commit.short_message());

        Ok(())
    }
}
