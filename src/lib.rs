//! A minimal content-addressed version control engine.
//!
//! The crate is split in three layers:
//!
//! - `areas`: stateful repository areas (object database, refs, index, workspace, lock)
//! - `artifacts`: object formats and the algorithms working on them
//! - `commands`: user-facing commands, each one implemented on `Repository`

pub mod areas;
pub mod artifacts;
pub mod commands;

/// Name of the repository metadata directory, relative to the workspace root
pub const MYGIT_DIR: &str = ".mygit";

/// Branch that a freshly initialized repository points HEAD at
pub const DEFAULT_BRANCH: &str = "master";
