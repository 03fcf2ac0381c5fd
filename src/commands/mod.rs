//! Command implementations
//!
//! Every command is an `impl Repository` block in its own file under
//! `porcelain`, taking already parsed arguments and writing its report to the
//! repository writer. Notices and warnings go to stderr.

pub mod porcelain;
