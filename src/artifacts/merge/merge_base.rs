//! Merge base resolution
//!
//! Finds the lowest common ancestors of two commits in the commit graph.
//!
//! ## Algorithm Overview
//!
//! ### Phase 1: Paint down to the common ancestors
//!
//! A walk starts from both tips at once and always expands the newest
//! pending commit (by commit timestamp):
//! - each commit carries the sides it was reached from
//! - a commit reached from both sides is a candidate merge base
//! - the ancestors of a candidate are marked STALE, they can only be worse
//! - the walk stops once every pending commit is STALE
//!
//! ### Phase 2: Drop redundant candidates
//!
//! Timestamps can lie (clock skew), so the walk can report a candidate that
//! is an ancestor of another one. Any candidate reachable from another
//! candidate is removed.
//!
//! The result is sorted by id; its first element is the canonical choice
//! when a single base is needed. An empty result means unrelated histories.
//!
//! ## Debug Logging
//!
//! The walk is very chatty. Its traces are compiled in only with the
//! `debug_merge` feature:
//!
//! ```toml
//! [features]
//! debug_merge = []
//! ```

use crate::areas::store::AncestryGraph;
use crate::artifacts::objects::commit::SlimCommit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::MergeResult;
use bitflags::bitflags;
use std::collections::hash_map::Entry;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::fmt;

/// Trace the merge base walk when the `debug_merge` feature is on
///
/// # Usage
/// ```rust,ignore
/// debug_log!("Processing commit {}", commit_id);
/// ```
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug_merge")]
        {
            tracing::trace!($($arg)*);
        }
    };
}

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
    struct VisitState: u8 {
        const NONE = 0b00;
        const VISITED_FROM_SOURCE = 0b01;
        const VISITED_FROM_TARGET = 0b10;
        const VISITED_FROM_BOTH = Self::VISITED_FROM_SOURCE.bits() | Self::VISITED_FROM_TARGET.bits();
        const STALE = 0b100;
        const RESULT = 0b1000;
    }
}

impl fmt::Debug for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(VisitState::VISITED_FROM_SOURCE) {
            flags.push("SOURCE");
        }
        if self.contains(VisitState::VISITED_FROM_TARGET) {
            flags.push("TARGET");
        }
        if self.contains(VisitState::STALE) {
            flags.push("STALE");
        }
        if self.contains(VisitState::RESULT) {
            flags.push("RESULT");
        }
        if flags.is_empty() {
            write!(f, "NONE")
        } else {
            write!(f, "{}", flags.join("|"))
        }
    }
}

impl fmt::Display for VisitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Resolves merge bases over an [`AncestryGraph`]
///
/// Commits loaded during a resolution are cached, so repeated queries on
/// the same resolver (like the redundancy filter) do not reload them.
pub struct MergeBaseResolver<'g, G: AncestryGraph + ?Sized> {
    graph: &'g G,
    cache: HashMap<ObjectId, SlimCommit>,
}

impl<'g, G: AncestryGraph + ?Sized> MergeBaseResolver<'g, G> {
    pub fn new(graph: &'g G) -> Self {
        MergeBaseResolver {
            graph,
            cache: HashMap::new(),
        }
    }

    fn load(&mut self, oid: &ObjectId) -> MergeResult<&SlimCommit> {
        match self.cache.entry(oid.clone()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => Ok(entry.insert(self.graph.slim_commit(oid)?)),
        }
    }

    /// All best common ancestors of `source` and `target`, sorted by id
    ///
    /// # Arguments
    ///
    /// * `source` - First tip
    /// * `target` - Second tip
    pub fn merge_bases(&mut self, source: &ObjectId, target: &ObjectId) -> MergeResult<Vec<ObjectId>> {
        if source == target {
            return Ok(vec![source.clone()]);
        }

        let candidates = self.paint_down(source, std::slice::from_ref(target))?;
        debug_log!(
            "Candidate merge bases: {}",
            candidates
                .iter()
                .map(|oid| oid.as_ref())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let mut redundant = HashSet::new();
        for candidate in &candidates {
            for other in &candidates {
                if candidate == other || redundant.contains(other) {
                    continue;
                }
                if self.is_ancestor(candidate, other)? {
                    debug_log!("{} is an ancestor of {}, dropping it", candidate, other);
                    redundant.insert(candidate.clone());
                    break;
                }
            }
        }

        let mut bases = candidates
            .into_iter()
            .filter(|candidate| !redundant.contains(candidate))
            .collect::<Vec<_>>();
        bases.sort();

        tracing::debug!(
            source = %source.to_short_oid(),
            target = %target.to_short_oid(),
            count = bases.len(),
            "resolved merge bases"
        );
        Ok(bases)
    }

    /// The canonical single merge base: the smallest id among the best ones
    pub fn merge_base(&mut self, source: &ObjectId, target: &ObjectId) -> MergeResult<Option<ObjectId>> {
        Ok(self.merge_bases(source, target)?.into_iter().next())
    }

    /// Whether `ancestor` is reachable from `descendant` (a commit is its own ancestor)
    pub fn is_ancestor(&mut self, ancestor: &ObjectId, descendant: &ObjectId) -> MergeResult<bool> {
        if ancestor == descendant {
            return Ok(true);
        }

        let mut seen = HashSet::from([descendant.clone()]);
        let mut pending = vec![descendant.clone()];

        while let Some(oid) = pending.pop() {
            let parents = self.load(&oid)?.parents.clone();
            for parent in parents {
                if &parent == ancestor {
                    return Ok(true);
                }
                if seen.insert(parent.clone()) {
                    pending.push(parent);
                }
            }
        }

        Ok(false)
    }

    /// Phase 1: commits reached from both sides that are not stale
    fn paint_down(&mut self, source: &ObjectId, targets: &[ObjectId]) -> MergeResult<Vec<ObjectId>> {
        let mut states = HashMap::<ObjectId, VisitState>::new();
        let mut queue = BinaryHeap::new();
        let mut results = Vec::new();

        states.insert(source.clone(), VisitState::VISITED_FROM_SOURCE);
        queue.push((self.load(source)?.timestamp, source.clone()));
        for target in targets {
            *states.entry(target.clone()).or_default() |= VisitState::VISITED_FROM_TARGET;
            queue.push((self.load(target)?.timestamp, target.clone()));
        }

        let is_stale = |states: &HashMap<ObjectId, VisitState>, oid: &ObjectId| {
            states
                .get(oid)
                .is_some_and(|state| state.contains(VisitState::STALE))
        };

        while queue.iter().any(|(_, oid)| !is_stale(&states, oid)) {
            let Some((_, commit_id)) = queue.pop() else {
                break;
            };
            let mut state = states.get(&commit_id).copied().unwrap_or_default();
            debug_log!("Processing commit {}: state={}", &commit_id, state);

            if state.contains(VisitState::VISITED_FROM_BOTH) {
                if !state.contains(VisitState::RESULT) {
                    state |= VisitState::RESULT;
                    states.insert(commit_id.clone(), state);
                    results.push(commit_id.clone());
                }
                state |= VisitState::STALE;
            }
            let inherited = state & (VisitState::VISITED_FROM_BOTH | VisitState::STALE);

            let parents = self.load(&commit_id)?.parents.clone();
            for parent in parents {
                let parent_state = states.get(&parent).copied().unwrap_or_default();
                if parent_state.contains(inherited) {
                    continue;
                }
                states.insert(parent.clone(), parent_state | inherited);
                let timestamp = self.load(&parent)?.timestamp;
                queue.push((timestamp, parent));
            }
        }

        Ok(results
            .into_iter()
            .filter(|oid| !is_stale(&states, oid))
            .collect())
    }
}
