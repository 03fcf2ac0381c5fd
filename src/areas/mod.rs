//! Stateful repository areas
//!
//! - `database`: object store for blobs, trees and commits
//! - `index`: staging area
//! - `lock`: repository-wide writer lock
//! - `refs`: branches and HEAD
//! - `repository`: the handle tying the areas together
//! - `workspace`: working directory access

pub mod database;
pub mod index;
pub mod lock;
pub mod refs;
pub mod repository;
pub mod workspace;
