//! Line splitting and comparison keys
//!
//! Lines keep their terminator, so `"a"` and `"a\n"` are different lines.
//! Comparison never looks at raw bytes directly: each line is normalised
//! according to the whitespace policy (and optionally the alphanumeric
//! simplification) and interned into an integer key. The diff algorithms
//! only ever see keys; edit ranges still index the original lines.

use crate::artifacts::diff::WhitespacePolicy;
use std::borrow::Cow;
use std::collections::HashMap;

/// Split content into lines, each keeping its trailing `\n`
pub fn split_lines(content: &[u8]) -> Vec<&[u8]> {
    content.split_inclusive(|&byte| byte == b'\n').collect()
}

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\r' | 0x0b | 0x0c)
}

/// Turns a line into the bytes used for comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineNormalizer {
    pub whitespace: WhitespacePolicy,
    pub simplify_alnum: bool,
}

impl LineNormalizer {
    pub fn new(whitespace: WhitespacePolicy, simplify_alnum: bool) -> Self {
        LineNormalizer {
            whitespace,
            simplify_alnum,
        }
    }

    pub fn normalize<'l>(&self, line: &'l [u8]) -> Cow<'l, [u8]> {
        if self.whitespace == WhitespacePolicy::None && !self.simplify_alnum {
            return Cow::Borrowed(line);
        }

        let (body, terminator) = match line.strip_suffix(b"\n") {
            Some(body) => (body, &b"\n"[..]),
            None => (line, &b""[..]),
        };

        let mut normalized = match self.whitespace {
            WhitespacePolicy::None => body.to_vec(),
            WhitespacePolicy::IgnoreAll => body.iter().copied().filter(|&b| !is_space(b)).collect(),
            WhitespacePolicy::IgnoreChange => collapse_runs(trim_end(body), is_space, b' '),
            WhitespacePolicy::IgnoreEndOfLine => trim_end(body).to_vec(),
        };
        if self.simplify_alnum {
            normalized = collapse_runs(&normalized, |b| !b.is_ascii_alphanumeric(), b'_');
        }

        normalized.extend_from_slice(terminator);
        Cow::Owned(normalized)
    }
}

fn trim_end(body: &[u8]) -> &[u8] {
    let end = body
        .iter()
        .rposition(|&b| !is_space(b))
        .map_or(0, |pos| pos + 1);
    &body[..end]
}

/// Replace every maximal run of bytes matching `in_run` with `replacement`
fn collapse_runs(bytes: &[u8], in_run: impl Fn(u8) -> bool, replacement: u8) -> Vec<u8> {
    let mut collapsed = Vec::with_capacity(bytes.len());
    let mut in_a_run = false;

    for &byte in bytes {
        if in_run(byte) {
            if !in_a_run {
                collapsed.push(replacement);
            }
            in_a_run = true;
        } else {
            collapsed.push(byte);
            in_a_run = false;
        }
    }

    collapsed
}

/// Assigns one integer key per distinct normalised line
///
/// Sharing an interner between several sequences makes their keys
/// comparable, which is how the file merger compares ours and theirs.
#[derive(Debug, Default)]
pub struct LineInterner {
    normalizer: LineNormalizer,
    keys: HashMap<Vec<u8>, usize>,
}

impl LineInterner {
    pub fn new(normalizer: LineNormalizer) -> Self {
        LineInterner {
            normalizer,
            keys: HashMap::new(),
        }
    }

    pub fn intern(&mut self, line: &[u8]) -> usize {
        let normalized = self.normalizer.normalize(line);
        if let Some(&key) = self.keys.get(normalized.as_ref()) {
            return key;
        }

        let key = self.keys.len();
        self.keys.insert(normalized.into_owned(), key);
        key
    }

    pub fn intern_all(&mut self, lines: &[&[u8]]) -> Vec<usize> {
        lines.iter().map(|line| self.intern(line)).collect()
    }
}
