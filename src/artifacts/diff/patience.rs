//! Patience alignment
//!
//! Lines that occur exactly once on both sides act as anchors. The longest
//! increasing subsequence of anchors (by position on the new side) is kept,
//! and the gaps between consecutive anchors are aligned recursively. A gap
//! without any unique line is handed to Myers.

use crate::artifacts::diff::myers::{Matches, MyersDiff};
use std::collections::HashMap;
use std::ops::Range;

pub struct PatienceDiff<'d> {
    a: &'d [usize],
    b: &'d [usize],
    /// Cost cap for the Myers fallback in anchor-free gaps
    max_cost: Option<usize>,
}

impl<'d> PatienceDiff<'d> {
    pub fn new(a: &'d [usize], b: &'d [usize], max_cost: Option<usize>) -> Self {
        PatienceDiff { a, b, max_cost }
    }

    pub fn matches(&self) -> Matches {
        let mut matches = Vec::new();
        self.align(0..self.a.len(), 0..self.b.len(), &mut matches);
        matches
    }

    fn align(&self, mut a: Range<usize>, mut b: Range<usize>, out: &mut Matches) {
        // common prefix
        while a.start < a.end && b.start < b.end && self.a[a.start] == self.b[b.start] {
            out.push((a.start, b.start));
            a.start += 1;
            b.start += 1;
        }

        // common suffix, emitted after the middle
        let mut suffix = Vec::new();
        while a.start < a.end && b.start < b.end && self.a[a.end - 1] == self.b[b.end - 1] {
            a.end -= 1;
            b.end -= 1;
            suffix.push((a.end, b.end));
        }

        if !a.is_empty() && !b.is_empty() {
            let anchors = self.unique_anchors(a.clone(), b.clone());

            if anchors.is_empty() {
                self.fallback(a, b, out);
            } else {
                let (mut a_pos, mut b_pos) = (a.start, b.start);
                for (a_anchor, b_anchor) in anchors {
                    self.align(a_pos..a_anchor, b_pos..b_anchor, out);
                    out.push((a_anchor, b_anchor));
                    (a_pos, b_pos) = (a_anchor + 1, b_anchor + 1);
                }
                self.align(a_pos..a.end, b_pos..b.end, out);
            }
        }

        out.extend(suffix.into_iter().rev());
    }

    fn fallback(&self, a: Range<usize>, b: Range<usize>, out: &mut Matches) {
        let myers = MyersDiff::new(&self.a[a.clone()], &self.b[b.clone()], self.max_cost);

        // too expensive: the whole gap stays unmatched
        if let Some(matches) = myers.matches() {
            out.extend(
                matches
                    .into_iter()
                    .map(|(x, y)| (x + a.start, y + b.start)),
            );
        }
    }

    /// Unique-on-both-sides lines, reduced to their longest increasing run
    fn unique_anchors(&self, a: Range<usize>, b: Range<usize>) -> Vec<(usize, usize)> {
        // key -> (count in a, position in a, count in b, position in b)
        let mut occurrences: HashMap<usize, (usize, usize, usize, usize)> = HashMap::new();

        for i in a.clone() {
            let entry = occurrences.entry(self.a[i]).or_insert((0, i, 0, 0));
            entry.0 += 1;
            entry.1 = i;
        }
        for j in b {
            if let Some(entry) = occurrences.get_mut(&self.b[j]) {
                entry.2 += 1;
                entry.3 = j;
            }
        }

        let mut candidates = occurrences
            .into_values()
            .filter(|&(count_a, _, count_b, _)| count_a == 1 && count_b == 1)
            .map(|(_, a_pos, _, b_pos)| (a_pos, b_pos))
            .collect::<Vec<_>>();
        candidates.sort_unstable();

        longest_increasing_by_new(&candidates)
    }
}

/// Longest subsequence whose new-side positions increase (patience sorting)
fn longest_increasing_by_new(candidates: &[(usize, usize)]) -> Vec<(usize, usize)> {
    // tails[len] = index of the smallest tail of an increasing run of len+1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessors: Vec<Option<usize>> = vec![None; candidates.len()];

    for (idx, &(_, b_pos)) in candidates.iter().enumerate() {
        let pile = tails.partition_point(|&tail| candidates[tail].1 < b_pos);
        if pile > 0 {
            predecessors[idx] = Some(tails[pile - 1]);
        }
        if pile == tails.len() {
            tails.push(idx);
        } else {
            tails[pile] = idx;
        }
    }

    let mut run = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(idx) = cursor {
        run.push(candidates[idx]);
        cursor = predecessors[idx];
    }
    run.reverse();
    run
}
