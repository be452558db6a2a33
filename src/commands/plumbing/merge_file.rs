use crate::artifacts::merge::file_merge::FileMerger;
use crate::artifacts::merge::options::{ConflictLabels, MergeFileFlags};
use anyhow::Context;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Highest exit status reported for a conflicted merge
pub const MAX_CONFLICT_STATUS: i32 = 127;

#[derive(Debug, Clone)]
pub struct MergeFileArgs {
    pub current: PathBuf,
    pub base: PathBuf,
    pub other: PathBuf,
    /// Up to three labels, for current, base and other in that order
    pub labels: Vec<String>,
    pub flags: MergeFileFlags,
    /// Write the result to the writer instead of over `current`
    pub stdout: bool,
}

impl MergeFileArgs {
    fn conflict_labels(&self) -> ConflictLabels {
        let mut labels = self.labels.iter().cloned();
        ConflictLabels {
            ours: labels.next().unwrap_or_else(|| label_of(&self.current)),
            base: labels.next().unwrap_or_else(|| label_of(&self.base)),
            theirs: labels.next().unwrap_or_else(|| label_of(&self.other)),
        }
    }
}

fn label_of(path: &Path) -> String {
    path.display().to_string()
}

fn read(path: &Path) -> anyhow::Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("unable to read {}", path.display()))
}

/// Three-way merge of three files on disk
///
/// Returns the number of conflicts, capped at [`MAX_CONFLICT_STATUS`], so it
/// can be used as the exit status directly.
pub fn merge_file(args: &MergeFileArgs, writer: &mut dyn Write) -> anyhow::Result<i32> {
    if args.labels.len() > 3 {
        anyhow::bail!("at most three labels can be given");
    }

    let current = read(&args.current)?;
    let base = read(&args.base)?;
    let other = read(&args.other)?;

    let merger = FileMerger::new(args.flags, args.conflict_labels());
    let result = merger.merge(Some(&base), &current, &other);

    if args.stdout {
        writer.write_all(result.content())?;
        writer.flush()?;
    } else {
        std::fs::write(&args.current, result.content())
            .with_context(|| format!("unable to write {}", args.current.display()))?;
    }

    let conflicts = match result.is_clean() {
        true => 0,
        // binary conflicts have no regions but still count once
        false => result.regions().len().max(1),
    };
    tracing::debug!(conflicts, path = %args.current.display(), "merged file");

    Ok(conflicts.min(MAX_CONFLICT_STATUS as usize) as i32)
}
