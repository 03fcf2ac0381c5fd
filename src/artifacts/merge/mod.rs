//! Merge algorithms
//!
//! - `merge_base`: ancestor walks and the nearest common ancestor of two commits
//! - `resolve`: per-path three-way resolution and conflict file content
//! - `merge_state`: the on-disk record of a merge waiting for its commit
//!
//! Tracing of the traversal and resolution decisions is compiled in with the
//! `debug_merge` feature (`cargo build --features debug_merge`).

/// Print to stderr when built with the `debug_merge` feature, nothing otherwise
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(any(feature = "debug_merge"))]
        {
            eprintln!($($arg)*);
        }
    };
}

pub mod merge_base;
pub mod merge_state;
pub mod resolve;
