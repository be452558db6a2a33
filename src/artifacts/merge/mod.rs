//! Three-way merging
//!
//! Layered leaf-first:
//!
//! - `file_merge`: one file against its ancestor, with conflict `markers`
//! - `tree_merge`: whole trees, including `rename` detection and parallel
//!   content merges
//! - `merge_base`: lowest common ancestors in the commit graph
//! - `driver`: fast-forward decisions, virtual bases and merge commits
//!
//! `options` holds the knobs of every layer; `outcome` the results.

pub mod cancellation;
pub mod driver;
pub mod file_merge;
pub mod markers;
pub mod merge_base;
pub mod options;
pub mod outcome;
pub mod rename;
pub mod tree_merge;
