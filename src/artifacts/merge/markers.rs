//! Conflict markers
//!
//! Writing: [`MarkerWriter`] appends conflict sections to an output buffer
//! and reports the byte span each conflict occupies.
//!
//! Reading: [`parse_conflicts`] recovers the sections of every conflict in a
//! marked blob as byte ranges, so callers (and tests) can get back exactly
//! what each side contributed.

use crate::artifacts::merge::options::ConflictLabels;
use std::ops::Range;

/// Length of the `<<<<<<<` / `|||||||` / `=======` / `>>>>>>>` markers
pub const MARKER_SIZE: usize = 7;

const OURS_MARKER: u8 = b'<';
const BASE_MARKER: u8 = b'|';
const SEPARATOR_MARKER: u8 = b'=';
const THEIRS_MARKER: u8 = b'>';

pub struct MarkerWriter<'w> {
    output: &'w mut Vec<u8>,
    labels: &'w ConflictLabels,
}

impl<'w> MarkerWriter<'w> {
    pub fn new(output: &'w mut Vec<u8>, labels: &'w ConflictLabels) -> Self {
        MarkerWriter { output, labels }
    }

    /// Append one conflict; returns the byte span it occupies
    ///
    /// `ancestor` is written as a diff3 section when present.
    pub fn write_conflict(
        &mut self,
        ours: &[&[u8]],
        ancestor: Option<&[&[u8]]>,
        theirs: &[&[u8]],
    ) -> Range<usize> {
        let labels = self.labels;
        self.terminate_line();
        let start = self.output.len();

        self.marker(OURS_MARKER, &labels.ours);
        self.lines(ours);
        if let Some(ancestor) = ancestor {
            self.marker(BASE_MARKER, &labels.base);
            self.lines(ancestor);
        }
        self.marker(SEPARATOR_MARKER, "");
        self.lines(theirs);
        self.marker(THEIRS_MARKER, &labels.theirs);

        start..self.output.len()
    }

    fn marker(&mut self, marker: u8, label: &str) {
        self.terminate_line();
        self.output.extend(std::iter::repeat_n(marker, MARKER_SIZE));
        if !label.is_empty() {
            self.output.push(b' ');
            self.output.extend_from_slice(label.as_bytes());
        }
        self.output.push(b'\n');
    }

    fn lines(&mut self, lines: &[&[u8]]) {
        for line in lines {
            self.output.extend_from_slice(line);
        }
    }

    /// A side whose last line lacks `\n` gets one before the next marker
    fn terminate_line(&mut self) {
        if self.output.last().is_some_and(|&byte| byte != b'\n') {
            self.output.push(b'\n');
        }
    }
}

/// Byte spans of one conflict found in a marked blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConflict {
    /// From the start of the opening marker to the end of the closing one
    pub whole: Range<usize>,
    pub ours: Range<usize>,
    pub ancestor: Option<Range<usize>>,
    pub theirs: Range<usize>,
}

impl ParsedConflict {
    pub fn ours<'c>(&self, content: &'c [u8]) -> &'c [u8] {
        &content[self.ours.clone()]
    }

    pub fn theirs<'c>(&self, content: &'c [u8]) -> &'c [u8] {
        &content[self.theirs.clone()]
    }

    pub fn ancestor<'c>(&self, content: &'c [u8]) -> Option<&'c [u8]> {
        self.ancestor.clone().map(|range| &content[range])
    }
}

fn marker_kind(line: &[u8]) -> Option<u8> {
    let first = *line.first()?;
    if !matches!(
        first,
        OURS_MARKER | BASE_MARKER | SEPARATOR_MARKER | THEIRS_MARKER
    ) {
        return None;
    }
    if line.len() < MARKER_SIZE || line[..MARKER_SIZE].iter().any(|&b| b != first) {
        return None;
    }

    match line.get(MARKER_SIZE) {
        None | Some(b'\n') | Some(b'\r') => Some(first),
        Some(b' ') if first != SEPARATOR_MARKER => Some(first),
        _ => None,
    }
}

enum ParseState {
    Outside,
    Ours { whole_start: usize, ours_start: usize },
    Ancestor { whole_start: usize, ours: Range<usize>, ancestor_start: usize },
    Theirs { whole_start: usize, ours: Range<usize>, ancestor: Option<Range<usize>>, theirs_start: usize },
}

/// Find every conflict in a marked blob
///
/// Unterminated or out-of-order markers are treated as plain content.
pub fn parse_conflicts(content: &[u8]) -> Vec<ParsedConflict> {
    let mut conflicts = Vec::new();
    let mut state = ParseState::Outside;
    let mut position = 0;

    for line in content.split_inclusive(|&byte| byte == b'\n') {
        let line_start = position;
        let line_end = position + line.len();
        position = line_end;

        state = match (state, marker_kind(line)) {
            (ParseState::Outside, Some(OURS_MARKER)) => ParseState::Ours {
                whole_start: line_start,
                ours_start: line_end,
            },
            (ParseState::Ours { whole_start, ours_start }, Some(BASE_MARKER)) => {
                ParseState::Ancestor {
                    whole_start,
                    ours: ours_start..line_start,
                    ancestor_start: line_end,
                }
            }
            (ParseState::Ours { whole_start, ours_start }, Some(SEPARATOR_MARKER)) => {
                ParseState::Theirs {
                    whole_start,
                    ours: ours_start..line_start,
                    ancestor: None,
                    theirs_start: line_end,
                }
            }
            (
                ParseState::Ancestor {
                    whole_start,
                    ours,
                    ancestor_start,
                },
                Some(SEPARATOR_MARKER),
            ) => ParseState::Theirs {
                whole_start,
                ours,
                ancestor: Some(ancestor_start..line_start),
                theirs_start: line_end,
            },
            (
                ParseState::Theirs {
                    whole_start,
                    ours,
                    ancestor,
                    theirs_start,
                },
                Some(THEIRS_MARKER),
            ) => {
                conflicts.push(ParsedConflict {
                    whole: whole_start..line_end,
                    ours,
                    ancestor,
                    theirs: theirs_start..line_start,
                });
                ParseState::Outside
            }
            // a new opening marker restarts an unterminated conflict
            (_, Some(OURS_MARKER)) => ParseState::Ours {
                whole_start: line_start,
                ours_start: line_end,
            },
            (state, _) => state,
        };
    }

    conflicts
}
