//! Merge options
//!
//! The option surface has two halves:
//!
//! - [`FastForwardStrategy`] decides whether the driver may advance a branch
//!   without a merge commit.
//! - [`MergeFileFlags`] is a combinable set of file-level switches (marker
//!   style, whitespace handling, diff algorithm). The bit values match the
//!   ones the wider git ecosystem uses, so a raw integer from an external
//!   caller maps onto the same set.

use crate::artifacts::diff::{DiffAlgorithm, WhitespacePolicy};
use crate::artifacts::objects::commit::Author;
use bitflags::bitflags;

/// Strategy used for deciding between fast-forward and merge commit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FastForwardStrategy {
    /// Use the configured `merge.ff` setting; fast-forward when possible if unset
    #[default]
    Default = 0,
    /// Never fast-forward; always create a merge commit
    NoFastForward = 1,
    /// Only fast-forward; anything else is refused
    FastForwardOnly = 2,
}

impl TryFrom<u8> for FastForwardStrategy {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> anyhow::Result<Self> {
        match value {
            0 => Ok(FastForwardStrategy::Default),
            1 => Ok(FastForwardStrategy::NoFastForward),
            2 => Ok(FastForwardStrategy::FastForwardOnly),
            _ => Err(anyhow::anyhow!("Invalid fast-forward strategy {}", value)),
        }
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct MergeFileFlags: u32 {
        /// Standard conflict markers (the default when no style bit is set)
        const STYLE_MERGE = 1 << 0;
        /// diff3-style markers, including the ancestor's text
        const STYLE_DIFF3 = 1 << 1;
        /// Condense non-alphanumeric runs before comparing lines
        const SIMPLIFY_ALNUM = 1 << 2;
        const IGNORE_WHITESPACE = 1 << 3;
        const IGNORE_WHITESPACE_CHANGE = 1 << 4;
        const IGNORE_WHITESPACE_EOL = 1 << 5;
        const DIFF_PATIENCE = 1 << 6;
        const DIFF_MINIMAL = 1 << 7;
    }
}

/// How conflicting hunks are written out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictStyle {
    Merge,
    Diff3,
}

impl MergeFileFlags {
    /// Default flag set (`0`)
    pub const DEFAULT: Self = Self::empty();

    /// diff3 wins when both style bits are set
    pub fn conflict_style(&self) -> ConflictStyle {
        if self.contains(Self::STYLE_DIFF3) {
            ConflictStyle::Diff3
        } else {
            ConflictStyle::Merge
        }
    }

    /// The strongest whitespace bit wins: all > change > end-of-line
    pub fn whitespace_policy(&self) -> WhitespacePolicy {
        if self.contains(Self::IGNORE_WHITESPACE) {
            WhitespacePolicy::IgnoreAll
        } else if self.contains(Self::IGNORE_WHITESPACE_CHANGE) {
            WhitespacePolicy::IgnoreChange
        } else if self.contains(Self::IGNORE_WHITESPACE_EOL) {
            WhitespacePolicy::IgnoreEndOfLine
        } else {
            WhitespacePolicy::None
        }
    }

    /// Patience wins when both algorithm bits are set
    pub fn diff_algorithm(&self) -> DiffAlgorithm {
        if self.contains(Self::DIFF_PATIENCE) {
            DiffAlgorithm::Patience
        } else if self.contains(Self::DIFF_MINIMAL) {
            DiffAlgorithm::Minimal
        } else {
            DiffAlgorithm::Default
        }
    }

    pub fn simplify_alnum(&self) -> bool {
        self.contains(Self::SIMPLIFY_ALNUM)
    }
}

/// Names written after the conflict markers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictLabels {
    pub ours: String,
    pub base: String,
    pub theirs: String,
}

impl Default for ConflictLabels {
    fn default() -> Self {
        ConflictLabels {
            ours: "ours".to_string(),
            base: "base".to_string(),
            theirs: "theirs".to_string(),
        }
    }
}

/// Default similarity (percent) for two paths to be paired as a rename
pub const DEFAULT_RENAME_THRESHOLD: u8 = 50;
/// Above `limit * limit` candidate pairs, only exact renames are detected
pub const DEFAULT_RENAME_LIMIT: usize = 1000;

/// Options of a whole merge
#[derive(Debug, Clone)]
pub struct MergeOptions {
    pub fast_forward: FastForwardStrategy,
    pub file_flags: MergeFileFlags,
    pub find_renames: bool,
    /// Percentage in `0..=100`
    pub rename_threshold: u8,
    pub rename_limit: usize,
    /// Parallel content merges; `None` uses the available hardware threads
    pub workers: Option<usize>,
    /// Merge commit message; defaults to `Merge commit '<theirs>'`
    pub message: Option<String>,
    /// Author of the merge commit; falls back to configuration
    pub author: Option<Author>,
    pub labels: ConflictLabels,
}

impl Default for MergeOptions {
    fn default() -> Self {
        MergeOptions {
            fast_forward: FastForwardStrategy::Default,
            file_flags: MergeFileFlags::DEFAULT,
            find_renames: true,
            rename_threshold: DEFAULT_RENAME_THRESHOLD,
            rename_limit: DEFAULT_RENAME_LIMIT,
            workers: None,
            message: None,
            author: None,
            labels: ConflictLabels::default(),
        }
    }
}

impl MergeOptions {
    /// Number of content merges allowed to run at once
    pub fn worker_count(&self) -> usize {
        self.workers
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
            .max(1)
    }
}
