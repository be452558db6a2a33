//! Myers shortest edit script
//!
//! Greedy forward search over diagonals `k = x - y`, recording the furthest
//! reaching `x` per diagonal for every edit cost `d` (the trace), then
//! walking the trace backwards to recover the matched line pairs.
//!
//! Only the `[-d, d]` window of each step is kept in the trace, so memory
//! grows with the square of the edit distance rather than with the inputs.
//! An optional cost cap stops the search early; the caller decides what to
//! do with a region that is too expensive to align exactly.

use derive_new::new;

/// Matched `(old, new)` index pairs, ascending
pub type Matches = Vec<(usize, usize)>;

#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct MyersDiff<'d> {
    a: &'d [usize],
    b: &'d [usize],
    max_cost: Option<usize>,
}

impl MyersDiff<'_> {
    /// Per-step snapshots of the diagonal frontier
    ///
    /// `None` when the edit distance exceeds the cost cap.
    fn compute_shortest_edit(&self) -> Option<Vec<Vec<isize>>> {
        let (n, m) = (self.a.len() as isize, self.b.len() as isize);
        let max = n + m;
        let limit = self.max_cost.map_or(max, |cap| (cap as isize).min(max));
        let offset = max + 1;

        let mut v = vec![0; 2 * offset as usize + 1];
        let mut trace = Vec::new();

        for d in 0..=limit {
            trace.push(v[(offset - d) as usize..=(offset + d) as usize].to_vec());

            for k in (-d..=d).step_by(2) {
                let idx = (offset + k) as usize;

                let mut x = if k == -d {
                    // we could have only come from k+1, thus an insertion
                    v[idx + 1]
                } else if k == d {
                    // we could have only come from k-1, thus a deletion
                    v[idx - 1] + 1
                } else {
                    let x_del = v[idx - 1] + 1;
                    let x_ins = v[idx + 1];
                    if x_del > x_ins { x_del } else { x_ins }
                };

                let mut y = x - k;
                while x < n && y < m && self.a[x as usize] == self.b[y as usize] {
                    // snake
                    x += 1;
                    y += 1;
                }

                v[idx] = x;

                if x >= n && y >= m {
                    return Some(trace);
                }
            }
        }

        None
    }

    fn backtrack(&self, trace: &[Vec<isize>]) -> Matches {
        let (mut x, mut y) = (self.a.len() as isize, self.b.len() as isize);
        let mut matches = Vec::new();

        for (d, v) in trace.iter().enumerate().rev() {
            let d = d as isize;

            if d == 0 {
                // the initial snake from (0, 0)
                while x > 0 && y > 0 {
                    matches.push(((x - 1) as usize, (y - 1) as usize));
                    x -= 1;
                    y -= 1;
                }
                break;
            }

            let at = |k: isize| v[(k + d) as usize];
            let k = x - y;

            let prev_k = if k == -d {
                k + 1
            } else if k == d {
                k - 1
            } else if at(k - 1) + 1 > at(k + 1) {
                k - 1
            } else {
                k + 1
            };

            let prev_x = at(prev_k);
            let prev_y = prev_x - prev_k;

            while x > prev_x && y > prev_y {
                matches.push(((x - 1) as usize, (y - 1) as usize));
                x -= 1;
                y -= 1;
            }

            (x, y) = (prev_x, prev_y);
        }

        matches.reverse();
        matches
    }

    /// Matched line pairs of a shortest edit script, or `None` over the cap
    pub fn matches(&self) -> Option<Matches> {
        let trace = self.compute_shortest_edit()?;
        Some(self.backtrack(&trace))
    }
}
