//! Plumbing commands
//!
//! Each command reads from the object database and reports on the
//! repository writer. None of them updates refs, the index or a worktree.
//!
//! ## Commands
//!
//! - `merge-file`: three-way merge of three files on disk
//! - `merge-base`: best common ancestors of two commits
//! - `merge-commits`: merge two commits, writing the merge commit on success

pub mod merge_base;
pub mod merge_commits;
pub mod merge_file;
