use crate::areas::database::Database;
use crate::areas::refs::Refs;
use crate::artifacts::branch::HEAD_REF_NAME;
use crate::artifacts::branch::branch_name::BranchName;
use crate::artifacts::core::repository_error::RepositoryError;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;

/// A user supplied commit reference: `HEAD` (or `@`), a branch or a full
/// commit id
///
/// Branch names win over ids when a branch happens to be named like an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Revision {
    Head,
    Branch(BranchName),
    Commit(ObjectId),
}

impl Revision {
    pub fn parse(revision: &str, refs: &Refs) -> anyhow::Result<Self> {
        if revision == HEAD_REF_NAME || revision == "@" {
            return Ok(Revision::Head);
        }

        if let Ok(name) = BranchName::try_parse(revision.to_string())
            && refs.branch_exists(&name)
        {
            return Ok(Revision::Branch(name));
        }

        if ObjectId::looks_like_oid(revision) {
            return Ok(Revision::Commit(ObjectId::try_parse(revision.to_string())?));
        }

        Err(RepositoryError::RefNotFound(revision.to_string()).into())
    }

    /// The commit this revision names; it must exist and be a commit
    pub fn resolve(&self, refs: &Refs, database: &Database) -> anyhow::Result<ObjectId> {
        match self {
            Revision::Head => Ok(refs.head()?.require_oid()?.clone()),
            Revision::Branch(name) => refs.resolve(name),
            Revision::Commit(oid) => {
                if !database.contains(oid) || database.object_type(oid)? != ObjectType::Commit {
                    return Err(RepositoryError::RefNotFound(oid.to_string()).into());
                }
                Ok(oid.clone())
            }
        }
    }
}

impl std::fmt::Display for Revision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Revision::Head => write!(f, "{HEAD_REF_NAME}"),
            Revision::Branch(name) => write!(f, "{name}"),
            Revision::Commit(oid) => write!(f, "{oid}"),
        }
    }
}
