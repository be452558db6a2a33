use crate::common::history::{commit, files, read_files, store};
use bit_merge::areas::store::MemoryStore;
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::merge_base::MergeBaseResolver;
use bit_merge::artifacts::merge::options::MergeOptions;
use bit_merge::artifacts::merge::outcome::MergeOutcome;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

/// History:
///       A
///      / \
///     B   C
///      \ / \
///       D   E
///
/// Merging E into D uses C as the single merge base.
#[rstest]
#[tokio::test]
async fn merge_after_diamond(store: Arc<MemoryStore>) -> Result<(), Box<dyn std::error::Error>> {
    let a = commit(&*store, &[], &[("file.txt", "A\n")], "Commit A");
    let b = commit(
        &*store,
        &[&a],
        &[("file.txt", "A\n"), ("b.txt", "B\n")],
        "Commit B",
    );
    let c = commit(&*store, &[&a], &[("file.txt", "A\nC\n")], "Commit C");
    let d = commit(
        &*store,
        &[&b, &c],
        &[("file.txt", "A\nC\n"), ("b.txt", "B\n")],
        "Commit D",
    );
    let e = commit(
        &*store,
        &[&c],
        &[("file.txt", "A\nC\nE\n")],
        "Commit E",
    );

    let bases = MergeBaseResolver::new(&*store).merge_bases(&d, &e)?;
    assert_eq!(bases, vec![c.clone()]);

    let up_to_date = Merger::new(store.clone())
        .perform_merge(&d, &c, &MergeOptions::default())
        .await?;
    assert_eq!(up_to_date, MergeOutcome::UpToDate);

    let outcome = Merger::new(store.clone())
        .perform_merge(&d, &e, &MergeOptions::default())
        .await?;
    let merge = outcome.commit().cloned().expect("merge commit");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[("b.txt", "B\n"), ("file.txt", "A\nC\nE\n")])
    );
    Ok(())
}
