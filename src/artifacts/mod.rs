//! Merge data structures and algorithms
//!
//! - `objects`: Git object types (blob, tree, commit) and their loose format
//! - `diff`: Line diffs between blobs (Myers, patience)
//! - `merge`: File, tree and commit merges

pub mod diff;
pub mod merge;
pub mod objects;
