use crate::areas::config::MergeConfig;
use crate::areas::repository::Repository;
use crate::artifacts::merge::driver::Merger;
use crate::artifacts::merge::options::MergeOptions;
use crate::artifacts::merge::outcome::{Conflict, MergeOutcome};
use anyhow::Context;
use colored::Colorize;

/// How a `merge-commits` run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStatus {
    /// Up to date, fast-forwarded or merged
    Clean,
    Conflicted,
    /// A fast-forward was required but the histories have diverged
    NotFastForward,
}

impl MergeStatus {
    pub fn exit_code(self) -> u8 {
        match self {
            MergeStatus::Clean => 0,
            MergeStatus::Conflicted => 1,
            MergeStatus::NotFastForward => 2,
        }
    }
}

impl Repository {
    /// Merge `theirs` into `ours` and print the outcome
    ///
    /// New objects land in the object database only for a clean merge. No
    /// ref is touched; the merge commit id is printed instead.
    ///
    /// A refused fast-forward is a normal outcome, not an error.
    pub async fn merge_commits(
        &self,
        ours: &str,
        theirs: &str,
        options: MergeOptions,
    ) -> anyhow::Result<MergeStatus> {
        let ours = self.resolve_revision(ours)?;
        let theirs = self.resolve_revision(theirs)?;
        let config = MergeConfig::load_from_env()?;

        let merger = Merger::new(self.store()).with_config(config);
        let outcome = merger
            .perform_merge(&ours, &theirs, &options)
            .await
            .with_context(|| {
                format!(
                    "unable to merge {} into {}",
                    theirs.to_short_oid(),
                    ours.to_short_oid()
                )
            })?;

        match outcome {
            MergeOutcome::UpToDate => {
                writeln!(self.writer(), "Already up to date.")?;
            }
            MergeOutcome::FastForwarded(oid) => {
                writeln!(
                    self.writer(),
                    "Fast-forward {}..{}",
                    ours.to_short_oid(),
                    oid.to_short_oid()
                )?;
                writeln!(self.writer(), "{}", oid)?;
            }
            MergeOutcome::Merged(oid) => {
                writeln!(self.writer(), "Merge made by the 'recursive' strategy.")?;
                writeln!(self.writer(), "{}", oid)?;
            }
            MergeOutcome::NonFastForwardable => {
                writeln!(
                    self.writer(),
                    "Not possible to fast-forward: {} and {} have diverged.",
                    ours.to_short_oid(),
                    theirs.to_short_oid()
                )?;
                return Ok(MergeStatus::NotFastForward);
            }
            MergeOutcome::Conflicts(result) => {
                for conflict in &result.conflicts {
                    self.print_conflict(conflict)?;
                }
                writeln!(
                    self.writer(),
                    "Automatic merge failed; {} conflicted path(s).",
                    result.conflicts.len()
                )?;
                return Ok(MergeStatus::Conflicted);
            }
        }

        Ok(MergeStatus::Clean)
    }

    fn print_conflict(&self, conflict: &Conflict) -> anyhow::Result<()> {
        let kind = format!("CONFLICT ({})", conflict.kind).red();
        let regions = conflict
            .content
            .as_ref()
            .map(|content| content.regions().len())
            .unwrap_or_default();

        match regions {
            0 => writeln!(self.writer(), "{}: {}", kind, conflict.path)?,
            n => writeln!(self.writer(), "{}: {} ({} hunk(s))", kind, conflict.path, n)?,
        }

        Ok(())
    }
}
