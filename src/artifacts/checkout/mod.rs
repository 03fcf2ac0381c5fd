//! Moving the working tree and index from one tree to another
//!
//! Every change is planned and checked against local modifications before
//! anything on disk is touched, so a refused checkout leaves no trace.

pub mod conflict;
pub mod migration;
