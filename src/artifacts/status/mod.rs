//! Working tree status
//!
//! Compares the working tree against the index and the index against the
//! HEAD tree, and reports unresolved merge conflicts.
//!
//! ## Components
//!
//! - `file_change`: change kinds and their labels
//! - `inspector`: per-path comparisons, shared with checkout
//! - `status_info`: the scan producing a `StatusInfo`

pub mod file_change;
pub mod inspector;
pub mod status_info;
