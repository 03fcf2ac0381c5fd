//! Content-addressed objects
//!
//! Every object is stored in its canonical form `<type> <size>\0<payload>` and
//! identified by the SHA-1 of that form. Three kinds exist:
//!
//! - **Blob**: raw file content
//! - **Tree**: a sorted directory listing of names, modes and object ids
//! - **Commit**: a tree snapshot plus parents, author and message

pub mod blob;
pub mod commit;
pub mod object;
pub mod object_id;
pub mod object_type;
pub mod tree;

/// Length of a SHA-1 hash in hexadecimal format
pub const OBJECT_ID_LENGTH: usize = 40;

/// Length of an abbreviated object id as printed by commands
pub const SHORT_OBJECT_ID_LENGTH: usize = 7;
