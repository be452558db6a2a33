//! Merge driver
//!
//! Takes two commits through `Start → ResolvingBase → Merging → Done`:
//!
//! - `Start` settles the cases that need no merge (same commit, already
//!   contained, fast-forward) according to the fast-forward strategy.
//! - `ResolvingBase` finds the merge bases.
//! - `Merging` folds multiple bases into a virtual one, merges the trees and,
//!   when clean, writes the merge commit.
//!
//! Every object is created in a staging overlay; the backing store only
//! sees the objects reachable from a clean merge commit.

use crate::areas::config::MergeConfig;
use crate::areas::staging::StagedStore;
use crate::areas::store::ObjectStore;
use crate::artifacts::merge::cancellation::CancellationToken;
use crate::artifacts::merge::merge_base::MergeBaseResolver;
use crate::artifacts::merge::options::{FastForwardStrategy, MergeOptions};
use crate::artifacts::merge::outcome::MergeOutcome;
use crate::artifacts::merge::tree_merge::{ConflictPolicy, TreeMergeOptions, TreeMerger};
use crate::artifacts::objects::commit::{Author, Commit};
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::MergeResult;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Nesting of virtual base merges before settling for the first base
pub const MAX_VIRTUAL_BASE_DEPTH: usize = 8;

const FALLBACK_NAME: &str = "bit-merge";
const FALLBACK_EMAIL: &str = "bit-merge@localhost";
const VIRTUAL_BASE_MESSAGE: &str = "merged common ancestors";

#[derive(Debug)]
enum MergeState {
    Start,
    ResolvingBase,
    Merging { bases: Vec<ObjectId> },
    Done(MergeOutcome),
}

type BaseFuture<'a> = Pin<Box<dyn Future<Output = MergeResult<Option<ObjectId>>> + Send + 'a>>;

pub struct Merger {
    store: Arc<dyn ObjectStore>,
    config: MergeConfig,
    cancellation: CancellationToken,
}

impl Merger {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Merger {
            store,
            config: MergeConfig::default(),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: MergeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// A handle that cancels merges run by this merger
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Merge `theirs` into `ours`
    ///
    /// # Arguments
    ///
    /// * `ours` - The commit being merged into
    /// * `theirs` - The commit being merged
    /// * `options` - Fast-forward strategy, file flags, rename detection and
    ///   commit metadata
    pub async fn perform_merge(
        &self,
        ours: &ObjectId,
        theirs: &ObjectId,
        options: &MergeOptions,
    ) -> MergeResult<MergeOutcome> {
        let staging = Arc::new(StagedStore::new(self.store.clone()));
        let strategy = self.config.resolve(options.fast_forward);
        let mut state = MergeState::Start;

        loop {
            self.cancellation.check()?;
            tracing::trace!(?state, "merge state");

            state = match state {
                MergeState::Start => self.start(ours, theirs, strategy)?,
                MergeState::ResolvingBase => {
                    let bases = MergeBaseResolver::new(&*self.store).merge_bases(ours, theirs)?;
                    MergeState::Merging { bases }
                }
                MergeState::Merging { bases } => MergeState::Done(
                    self.merge_commits(&staging, ours, theirs, bases, options)
                        .await?,
                ),
                MergeState::Done(outcome) => {
                    tracing::info!(
                        ours = %ours.to_short_oid(),
                        theirs = %theirs.to_short_oid(),
                        outcome = outcome_name(&outcome),
                        "merge finished"
                    );
                    return Ok(outcome);
                }
            };
        }
    }

    fn start(
        &self,
        ours: &ObjectId,
        theirs: &ObjectId,
        strategy: FastForwardStrategy,
    ) -> MergeResult<MergeState> {
        if ours == theirs {
            return Ok(MergeState::Done(MergeOutcome::UpToDate));
        }

        let mut resolver = MergeBaseResolver::new(&*self.store);
        if resolver.is_ancestor(theirs, ours)? {
            return Ok(MergeState::Done(MergeOutcome::UpToDate));
        }

        let next = match strategy {
            FastForwardStrategy::NoFastForward => MergeState::ResolvingBase,
            _ if resolver.is_ancestor(ours, theirs)? => {
                MergeState::Done(MergeOutcome::FastForwarded(theirs.clone()))
            }
            FastForwardStrategy::FastForwardOnly => {
                MergeState::Done(MergeOutcome::NonFastForwardable)
            }
            FastForwardStrategy::Default => MergeState::ResolvingBase,
        };
        Ok(next)
    }

    async fn merge_commits(
        &self,
        staging: &Arc<StagedStore>,
        ours: &ObjectId,
        theirs: &ObjectId,
        bases: Vec<ObjectId>,
        options: &MergeOptions,
    ) -> MergeResult<MergeOutcome> {
        let base = self.virtual_base(staging, bases, options, 0).await?;
        let base_tree = match &base {
            Some(base) => Some(staging.get_commit(base)?.tree_oid().clone()),
            None => None,
        };
        let ours_tree = staging.get_commit(ours)?.tree_oid().clone();
        let theirs_tree = staging.get_commit(theirs)?.tree_oid().clone();

        let merger = TreeMerger::new(
            staging.clone(),
            TreeMergeOptions::from(options),
            self.cancellation.clone(),
        );
        let result = merger
            .merge(base_tree.as_ref(), &ours_tree, &theirs_tree)
            .await?;

        if !result.is_clean() {
            return Ok(MergeOutcome::Conflicts(result));
        }

        let author = self.author(options);
        let message = options
            .message
            .clone()
            .unwrap_or_else(|| format!("Merge commit '{}'", theirs));
        let commit = Commit::new(
            vec![ours.clone(), theirs.clone()],
            result.tree.clone(),
            author.clone(),
            message,
        )
        .with_committer(author);
        let commit_oid = staging.put_commit(&commit)?;

        self.cancellation.check()?;
        staging.flush_reachable(std::slice::from_ref(&commit_oid))?;

        Ok(MergeOutcome::Merged(commit_oid))
    }

    /// Fold several merge bases into one commit
    ///
    /// Bases are merged pairwise with conflicts embedded, each pair against
    /// its own (recursively folded) merge base. The result lives only in the
    /// staging overlay.
    fn virtual_base<'a>(
        &'a self,
        staging: &'a Arc<StagedStore>,
        bases: Vec<ObjectId>,
        options: &'a MergeOptions,
        depth: usize,
    ) -> BaseFuture<'a> {
        Box::pin(async move {
            let mut bases = bases.into_iter();
            let Some(mut current) = bases.next() else {
                return Ok(None);
            };
            if depth >= MAX_VIRTUAL_BASE_DEPTH {
                tracing::debug!(depth, "virtual base too deep, using the first base");
                return Ok(Some(current));
            }

            let tree_options = TreeMergeOptions {
                policy: ConflictPolicy::Embed,
                ..TreeMergeOptions::from(options)
            };

            for next in bases {
                self.cancellation.check()?;

                let pair_bases =
                    MergeBaseResolver::new(&**staging).merge_bases(&current, &next)?;
                let pair_base = self
                    .virtual_base(staging, pair_bases, options, depth + 1)
                    .await?;
                let pair_base_tree = match &pair_base {
                    Some(base) => Some(staging.get_commit(base)?.tree_oid().clone()),
                    None => None,
                };

                let current_tree = staging.get_commit(&current)?.tree_oid().clone();
                let next_tree = staging.get_commit(&next)?.tree_oid().clone();
                let merged = TreeMerger::new(
                    staging.clone(),
                    tree_options.clone(),
                    self.cancellation.clone(),
                )
                .merge(pair_base_tree.as_ref(), &current_tree, &next_tree)
                .await?;

                let author = self.author(options);
                let commit = Commit::new(
                    vec![current.clone(), next.clone()],
                    merged.tree,
                    author.clone(),
                    VIRTUAL_BASE_MESSAGE.to_string(),
                )
                .with_committer(author);

                tracing::debug!(
                    left = %current.to_short_oid(),
                    right = %next.to_short_oid(),
                    depth,
                    "built virtual merge base"
                );
                current = staging.put_commit(&commit)?;
            }

            Ok(Some(current))
        })
    }

    fn author(&self, options: &MergeOptions) -> Author {
        options
            .author
            .clone()
            .or_else(|| self.config.author.clone())
            .unwrap_or_else(|| Author::new(FALLBACK_NAME.to_string(), FALLBACK_EMAIL.to_string()))
    }
}

fn outcome_name(outcome: &MergeOutcome) -> &'static str {
    match outcome {
        MergeOutcome::UpToDate => "up to date",
        MergeOutcome::FastForwarded(_) => "fast-forward",
        MergeOutcome::Merged(_) => "merged",
        MergeOutcome::Conflicts(_) => "conflicts",
        MergeOutcome::NonFastForwardable => "not fast-forwardable",
    }
}
