//! Three-way merge of a single file
//!
//! ## Algorithm
//!
//! Both sides are diffed against the ancestor. The changed hunks of the two
//! edit scripts are then swept in ancestor order and grouped: a group starts
//! at the earliest pending hunk and absorbs every hunk (from either side)
//! that overlaps it, until nothing more overlaps.
//!
//! Two hunks overlap when their ancestor ranges intersect, when both are
//! insertions at the same ancestor position, or when one inserts strictly
//! inside the range the other replaces. Hunks that merely touch (adjacent
//! lines) do not overlap and merge cleanly.
//!
//! Per group:
//!
//! - only one side changed: that side's lines are taken
//! - both changed to the same lines: taken once (from ours)
//! - both changed differently: conflict
//!
//! Lines unchanged on both sides are copied from ours, so edits that the
//! whitespace policy hides (e.g. re-indentation on our side) survive.
//!
//! ## Binary content
//!
//! Content with a NUL byte near the start is never merged line by line.
//! It resolves only when one side is untouched or both sides agree.

use crate::artifacts::diff::diff_keys;
use crate::artifacts::diff::edit::Edit;
use crate::artifacts::diff::lines::{LineInterner, LineNormalizer, split_lines};
use crate::artifacts::merge::markers::MarkerWriter;
use crate::artifacts::merge::options::{ConflictLabels, ConflictStyle, MergeFileFlags};
use crate::artifacts::objects::blob::is_binary;
use bytes::Bytes;
use std::ops::Range;

/// One conflict inside a marked file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictRegion {
    /// Lines of ours inside the conflict
    pub ours: Range<usize>,
    /// Lines of theirs inside the conflict
    pub theirs: Range<usize>,
    /// Lines of the ancestor the conflict replaces, when there is an ancestor
    pub ancestor: Option<Range<usize>>,
    /// Bytes of the marked output, from the opening to the closing marker
    pub output: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileMergeResult {
    Clean(Bytes),
    Conflicted {
        content: Bytes,
        regions: Vec<ConflictRegion>,
    },
}

impl FileMergeResult {
    pub fn is_clean(&self) -> bool {
        matches!(self, FileMergeResult::Clean(_))
    }

    /// Merged content, with conflict markers when conflicted
    pub fn content(&self) -> &Bytes {
        match self {
            FileMergeResult::Clean(content) | FileMergeResult::Conflicted { content, .. } => {
                content
            }
        }
    }

    pub fn regions(&self) -> &[ConflictRegion] {
        match self {
            FileMergeResult::Clean(_) => &[],
            FileMergeResult::Conflicted { regions, .. } => regions,
        }
    }
}

/// A changed hunk of one side's edit script
#[derive(Debug, Clone)]
struct Hunk {
    ancestor: Range<usize>,
    side: Range<usize>,
}

impl Hunk {
    fn growth(&self) -> isize {
        self.side.len() as isize - self.ancestor.len() as isize
    }
}

fn hunks(edits: &[Edit]) -> Vec<Hunk> {
    edits
        .iter()
        .filter(|edit| edit.is_change())
        .map(|edit| Hunk {
            ancestor: edit.old.clone(),
            side: edit.new.clone(),
        })
        .collect()
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => a.start == b.start,
        (true, false) => b.start < a.start && a.start < b.end,
        (false, true) => a.start < b.start && b.start < a.end,
        (false, false) => a.start.max(b.start) < a.end.min(b.end),
    }
}

/// Cursor over one side's hunks during the sweep
struct SideCursor {
    hunks: Vec<Hunk>,
    next: usize,
    /// Line offset of this side relative to the ancestor, before `next`
    delta: isize,
}

impl SideCursor {
    fn new(hunks: Vec<Hunk>) -> Self {
        SideCursor {
            hunks,
            next: 0,
            delta: 0,
        }
    }

    fn peek(&self) -> Option<&Hunk> {
        self.hunks.get(self.next)
    }

    fn advance(&mut self) -> Range<usize> {
        let hunk = &self.hunks[self.next];
        self.delta += hunk.growth();
        self.next += 1;
        hunk.ancestor.clone()
    }

    fn map(&self, ancestor_line: usize) -> usize {
        (ancestor_line as isize + self.delta) as usize
    }
}

/// One step of the sweep
enum Section {
    /// Take these lines of ours
    Ours(Range<usize>),
    /// Take these lines of theirs
    Theirs(Range<usize>),
    Conflict {
        ancestor: Range<usize>,
        ours: Range<usize>,
        theirs: Range<usize>,
    },
}

struct Sides<'s> {
    ancestor: Vec<&'s [u8]>,
    ours: Vec<&'s [u8]>,
    theirs: Vec<&'s [u8]>,
    ancestor_keys: Vec<usize>,
    ours_keys: Vec<usize>,
    theirs_keys: Vec<usize>,
}

impl<'s> Sides<'s> {
    fn new(
        ancestor: &'s [u8],
        ours: &'s [u8],
        theirs: &'s [u8],
        normalizer: LineNormalizer,
    ) -> Self {
        let (ancestor, ours, theirs) = (split_lines(ancestor), split_lines(ours), split_lines(theirs));

        let mut interner = LineInterner::new(normalizer);
        let ancestor_keys = interner.intern_all(&ancestor);
        let ours_keys = interner.intern_all(&ours);
        let theirs_keys = interner.intern_all(&theirs);

        Sides {
            ancestor,
            ours,
            theirs,
            ancestor_keys,
            ours_keys,
            theirs_keys,
        }
    }
}

/// Three-way file merger configured by [`MergeFileFlags`]
#[derive(Debug, Clone, Default)]
pub struct FileMerger {
    flags: MergeFileFlags,
    labels: ConflictLabels,
}

impl FileMerger {
    pub fn new(flags: MergeFileFlags, labels: ConflictLabels) -> Self {
        FileMerger { flags, labels }
    }

    pub fn flags(&self) -> MergeFileFlags {
        self.flags
    }

    /// Merge `ours` and `theirs` against `ancestor`
    ///
    /// # Arguments
    ///
    /// * `ancestor` - Common ancestor content; `None` when both sides added the file
    /// * `ours` - Our side, which also supplies unchanged regions
    /// * `theirs` - Their side
    pub fn merge(&self, ancestor: Option<&[u8]>, ours: &[u8], theirs: &[u8]) -> FileMergeResult {
        if ours == theirs {
            return FileMergeResult::Clean(Bytes::copy_from_slice(ours));
        }

        if is_binary(ours) || is_binary(theirs) || ancestor.is_some_and(is_binary) {
            return self.merge_binary(ancestor, ours, theirs);
        }

        let normalizer =
            LineNormalizer::new(self.flags.whitespace_policy(), self.flags.simplify_alnum());
        let sides = Sides::new(ancestor.unwrap_or_default(), ours, theirs, normalizer);

        let sections = match ancestor {
            Some(_) => self.sweep(&sides),
            None if sides.ours_keys == sides.theirs_keys => vec![Section::Ours(0..sides.ours.len())],
            None => vec![Section::Conflict {
                ancestor: 0..0,
                ours: 0..sides.ours.len(),
                theirs: 0..sides.theirs.len(),
            }],
        };

        self.render(&sides, sections, ancestor.is_some())
    }

    fn sweep(&self, sides: &Sides<'_>) -> Vec<Section> {
        let algorithm = self.flags.diff_algorithm();
        let mut ours = SideCursor::new(hunks(&diff_keys(&sides.ancestor_keys, &sides.ours_keys, algorithm)));
        let mut theirs =
            SideCursor::new(hunks(&diff_keys(&sides.ancestor_keys, &sides.theirs_keys, algorithm)));

        let mut sections = Vec::new();
        let mut position = 0;

        loop {
            let ours_first = match (ours.peek(), theirs.peek()) {
                (None, None) => break,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(o), Some(t)) => {
                    (o.ancestor.start, o.ancestor.end) <= (t.ancestor.start, t.ancestor.end)
                }
            };

            // unchanged lines before the group come from ours
            let (ours_before, theirs_before) = (ours.delta, theirs.delta);
            let mut group = if ours_first { ours.advance() } else { theirs.advance() };
            if group.start > position {
                let start = (position as isize + ours_before) as usize;
                let end = (group.start as isize + ours_before) as usize;
                sections.push(Section::Ours(start..end));
            }
            let (mut ours_changed, mut theirs_changed) = (ours_first, !ours_first);

            loop {
                let absorbed = if ours.peek().is_some_and(|h| overlaps(&group, &h.ancestor)) {
                    ours_changed = true;
                    ours.advance()
                } else if theirs.peek().is_some_and(|h| overlaps(&group, &h.ancestor)) {
                    theirs_changed = true;
                    theirs.advance()
                } else {
                    break;
                };
                group = group.start.min(absorbed.start)..group.end.max(absorbed.end);
            }

            let ours_span = (group.start as isize + ours_before) as usize..ours.map(group.end);
            let theirs_span = (group.start as isize + theirs_before) as usize..theirs.map(group.end);

            let section = match (ours_changed, theirs_changed) {
                (true, false) => Section::Ours(ours_span),
                (false, _) => Section::Theirs(theirs_span),
                (true, true)
                    if sides.ours_keys[ours_span.clone()] == sides.theirs_keys[theirs_span.clone()] =>
                {
                    Section::Ours(ours_span)
                }
                (true, true) => Section::Conflict {
                    ancestor: group.clone(),
                    ours: ours_span,
                    theirs: theirs_span,
                },
            };
            sections.push(section);
            position = group.end;
        }

        if position < sides.ancestor.len() {
            sections.push(Section::Ours(ours.map(position)..sides.ours.len()));
        }

        sections
    }

    fn render(&self, sides: &Sides<'_>, sections: Vec<Section>, has_ancestor: bool) -> FileMergeResult {
        let style = self.flags.conflict_style();
        let mut output = Vec::new();
        let mut regions = Vec::new();

        for section in sections {
            match section {
                Section::Ours(lines) => extend(&mut output, &sides.ours[lines]),
                Section::Theirs(lines) => extend(&mut output, &sides.theirs[lines]),
                Section::Conflict {
                    ancestor,
                    mut ours,
                    mut theirs,
                } => {
                    let (prefix, suffix) = match style {
                        ConflictStyle::Merge => refine(sides, &mut ours, &mut theirs),
                        ConflictStyle::Diff3 => (0..0, 0..0),
                    };
                    extend(&mut output, &sides.ours[prefix]);

                    let ancestor_section = match (style, has_ancestor) {
                        (ConflictStyle::Diff3, true) => Some(&sides.ancestor[ancestor.clone()]),
                        _ => None,
                    };
                    let span = MarkerWriter::new(&mut output, &self.labels).write_conflict(
                        &sides.ours[ours.clone()],
                        ancestor_section,
                        &sides.theirs[theirs.clone()],
                    );

                    extend(&mut output, &sides.ours[suffix]);

                    regions.push(ConflictRegion {
                        ours,
                        theirs,
                        ancestor: has_ancestor.then_some(ancestor),
                        output: span,
                    });
                }
            }
        }

        if regions.is_empty() {
            FileMergeResult::Clean(output.into())
        } else {
            FileMergeResult::Conflicted {
                content: output.into(),
                regions,
            }
        }
    }

    fn merge_binary(&self, ancestor: Option<&[u8]>, ours: &[u8], theirs: &[u8]) -> FileMergeResult {
        match ancestor {
            Some(ancestor) if ancestor == ours => FileMergeResult::Clean(Bytes::copy_from_slice(theirs)),
            Some(ancestor) if ancestor == theirs => FileMergeResult::Clean(Bytes::copy_from_slice(ours)),
            _ => FileMergeResult::Conflicted {
                content: Bytes::copy_from_slice(ours),
                regions: vec![ConflictRegion {
                    ours: 0..split_lines(ours).len(),
                    theirs: 0..split_lines(theirs).len(),
                    ancestor: ancestor.map(|a| 0..split_lines(a).len()),
                    output: 0..ours.len(),
                }],
            },
        }
    }
}

/// Hoist lines common to the start and end of both sides out of a conflict
///
/// Returns the hoisted prefix and suffix as ranges of ours.
fn refine(
    sides: &Sides<'_>,
    ours: &mut Range<usize>,
    theirs: &mut Range<usize>,
) -> (Range<usize>, Range<usize>) {
    let prefix_start = ours.start;
    while !ours.is_empty()
        && !theirs.is_empty()
        && sides.ours_keys[ours.start] == sides.theirs_keys[theirs.start]
    {
        ours.start += 1;
        theirs.start += 1;
    }

    let suffix_end = ours.end;
    while !ours.is_empty()
        && !theirs.is_empty()
        && sides.ours_keys[ours.end - 1] == sides.theirs_keys[theirs.end - 1]
    {
        ours.end -= 1;
        theirs.end -= 1;
    }

    (prefix_start..ours.start, ours.end..suffix_end)
}

fn extend(output: &mut Vec<u8>, lines: &[&[u8]]) {
    for line in lines {
        output.extend_from_slice(line);
    }
}

/// Merge with default labels
pub fn merge_file(
    ancestor: Option<&[u8]>,
    ours: &[u8],
    theirs: &[u8],
    flags: MergeFileFlags,
) -> FileMergeResult {
    FileMerger::new(flags, ConflictLabels::default()).merge(ancestor, ours, theirs)
}
