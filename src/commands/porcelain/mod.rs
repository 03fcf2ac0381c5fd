//! User-facing commands
//!
//! - `init`: create the `.mygit` directory
//! - `add`, `rm`: stage and unstage paths
//! - `commit`: record the index as a new commit
//! - `status`: compare HEAD, the index and the working tree
//! - `log`: walk the history from HEAD
//! - `branch`: list, create and delete branches
//! - `checkout`: switch branches or detach HEAD
//! - `merge`: fast-forward or three-way merge a branch into HEAD

pub mod add;
pub mod branch;
pub mod checkout;
pub mod commit;
pub mod init;
pub mod log;
pub mod merge;
pub mod rm;
pub mod status;
