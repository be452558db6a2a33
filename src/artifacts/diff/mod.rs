//! Line-level blob differ
//!
//! - `lines`: splitting, whitespace normalisation and key interning
//! - `myers`: Myers shortest edit script with an optional cost cap
//! - `patience`: unique-line anchored alignment
//! - `edit`: the edit script representation
//!
//! [`diff`] is the entry point. Its result is lazy: nothing is aligned
//! until the edits are first read, and they can be read any number of times.

pub mod edit;
pub mod lines;
pub mod myers;
pub mod patience;

use crate::artifacts::diff::edit::{Edit, EditTag, edits_from_matches};
use crate::artifacts::diff::lines::{LineInterner, LineNormalizer, split_lines};
use crate::artifacts::diff::myers::MyersDiff;
use crate::artifacts::diff::patience::PatienceDiff;
use crate::artifacts::objects::blob::is_binary;
use std::cell::OnceCell;

/// Cost cap of the default algorithm before it settles for a coarser script
pub const DEFAULT_MAX_COST: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DiffAlgorithm {
    /// Myers with a cost cap; expensive regions fall back to patience
    /// anchors, and a gap between anchors still over the cap is one replace
    #[default]
    Default,
    Patience,
    /// Uncapped Myers: always a smallest edit script
    Minimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum WhitespacePolicy {
    #[default]
    None,
    IgnoreAll,
    IgnoreChange,
    IgnoreEndOfLine,
}

/// Align two key sequences with the chosen algorithm
///
/// Common prefix and suffix are trimmed before any algorithm runs.
pub fn diff_keys(a: &[usize], b: &[usize], algorithm: DiffAlgorithm) -> Vec<Edit> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let a_mid = &a[prefix..a.len() - suffix];
    let b_mid = &b[prefix..b.len() - suffix];

    let middle = match algorithm {
        DiffAlgorithm::Minimal => MyersDiff::new(a_mid, b_mid, None).matches(),
        DiffAlgorithm::Patience => Some(PatienceDiff::new(a_mid, b_mid, None).matches()),
        DiffAlgorithm::Default => MyersDiff::new(a_mid, b_mid, Some(DEFAULT_MAX_COST))
            .matches()
            .or_else(|| {
                tracing::trace!(
                    old = a_mid.len(),
                    new = b_mid.len(),
                    "edit cost above cap, anchoring on unique lines"
                );
                Some(PatienceDiff::new(a_mid, b_mid, Some(DEFAULT_MAX_COST)).matches())
            }),
    }
    .unwrap_or_default();

    let mut matches = Vec::with_capacity(prefix + middle.len() + suffix);
    matches.extend((0..prefix).map(|i| (i, i)));
    matches.extend(middle.into_iter().map(|(x, y)| (x + prefix, y + prefix)));
    matches.extend((0..suffix).map(|i| (a.len() - suffix + i, b.len() - suffix + i)));

    edits_from_matches(a.len(), b.len(), &matches)
}

/// Lazily computed diff of two blobs
pub struct BlobDiff<'b> {
    old_lines: Vec<&'b [u8]>,
    new_lines: Vec<&'b [u8]>,
    binary: bool,
    algorithm: DiffAlgorithm,
    normalizer: LineNormalizer,
    edits: OnceCell<Vec<Edit>>,
}

impl<'b> BlobDiff<'b> {
    pub fn old_lines(&self) -> &[&'b [u8]] {
        &self.old_lines
    }

    pub fn new_lines(&self) -> &[&'b [u8]] {
        &self.new_lines
    }

    pub fn is_binary(&self) -> bool {
        self.binary
    }

    /// The edit script, computed on first access
    pub fn edits(&self) -> &[Edit] {
        self.edits.get_or_init(|| self.compute())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Edit> {
        self.edits().iter()
    }

    /// Whether the two sides compare equal under the whitespace policy
    pub fn is_identical(&self) -> bool {
        self.edits().iter().all(|edit| !edit.is_change())
    }

    fn compute(&self) -> Vec<Edit> {
        let (old_len, new_len) = (self.old_lines.len(), self.new_lines.len());

        if self.binary {
            // binary content is a single opaque "line"
            return if old_len + new_len == 0 {
                Vec::new()
            } else if self.old_lines == self.new_lines {
                vec![Edit::new(EditTag::Equal, 0..old_len, 0..new_len)]
            } else {
                vec![Edit::change(0..old_len, 0..new_len)]
            };
        }

        let mut interner = LineInterner::new(self.normalizer);
        let old_keys = interner.intern_all(&self.old_lines);
        let new_keys = interner.intern_all(&self.new_lines);

        diff_keys(&old_keys, &new_keys, self.algorithm)
    }
}

impl<'a, 'b> IntoIterator for &'a BlobDiff<'b> {
    type Item = &'a Edit;
    type IntoIter = std::slice::Iter<'a, Edit>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Diff `base` against `other`
///
/// Content with a NUL byte near the start (on either side) is treated as
/// binary and compared wholesale.
pub fn diff<'b>(
    base: &'b [u8],
    other: &'b [u8],
    algorithm: DiffAlgorithm,
    whitespace: WhitespacePolicy,
) -> BlobDiff<'b> {
    let binary = is_binary(base) || is_binary(other);
    let split = |content: &'b [u8]| {
        if binary {
            if content.is_empty() { vec![] } else { vec![content] }
        } else {
            split_lines(content)
        }
    };

    BlobDiff {
        old_lines: split(base),
        new_lines: split(other),
        binary,
        algorithm,
        normalizer: LineNormalizer::new(whitespace, false),
        edits: OnceCell::new(),
    }
}

impl Edit {
    /// Render the edit in a unified-diff-like form, for debugging
    pub fn describe(&self, diff: &BlobDiff<'_>) -> String {
        let render = |lines: &[&[u8]], prefix: char| {
            lines
                .iter()
                .map(|line| format!("{}{}", prefix, String::from_utf8_lossy(line)))
                .collect::<String>()
        };

        match self.tag {
            EditTag::Equal => render(&diff.old_lines()[self.old.clone()], ' '),
            _ => {
                render(&diff.old_lines()[self.old.clone()], '-')
                    + &render(&diff.new_lines()[self.new.clone()], '+')
            }
        }
    }
}
