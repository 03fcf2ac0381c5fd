//! Commit history traversal
//!
//! `rev_list` walks everything reachable from a start commit in reverse
//! chronological topological order: a commit is emitted only after all of its
//! reachable children, newest first among the ready ones.

pub mod rev_list;
