//! Command implementations behind the `bit-merge` binary

pub mod plumbing;
