//! Data structures and algorithms
//!
//! - `branch`: branch names and revision parsing
//! - `checkout`: working tree migrations and their conflict checks
//! - `core`: the error taxonomy
//! - `database`: tree entries as stored in the object database
//! - `diff`: file-level tree comparison
//! - `index`: index file encoding
//! - `log`: history traversal
//! - `merge`: merge base, three-way resolution and merge state
//! - `objects`: blob, tree and commit objects
//! - `status`: change classification

pub mod branch;
pub mod checkout;
pub mod core;
pub mod database;
pub mod diff;
pub mod index;
pub mod log;
pub mod merge;
pub mod objects;
pub mod status;
