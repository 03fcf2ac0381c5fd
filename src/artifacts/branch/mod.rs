pub mod branch_name;
pub mod revision;

/// Names matching this pattern are rejected as branch names
pub const INVALID_BRANCH_NAME_REGEX: &str =
    r"^\.|\/\.|\.\.|^\/|\/$|\.lock$|@\{|[\x00-\x20\*:\?\[\\~\^\x7f]";

/// Namespace of branch refs relative to the repository directory
pub const REF_PREFIX: &str = "refs/heads/";

/// Name of the HEAD reference
pub const HEAD_REF_NAME: &str = "HEAD";
