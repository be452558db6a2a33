use crate::common::history::{commit, store};
use bit_merge::areas::store::MemoryStore;
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::options::{FastForwardStrategy, MergeOptions};
use bit_merge::artifacts::merge::outcome::MergeOutcome;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

#[rstest]
#[case(FastForwardStrategy::Default)]
#[case(FastForwardStrategy::NoFastForward)]
#[case(FastForwardStrategy::FastForwardOnly)]
#[tokio::test]
async fn merging_a_commit_with_itself_is_up_to_date(
    store: Arc<MemoryStore>,
    #[case] fast_forward: FastForwardStrategy,
) -> Result<(), Box<dyn std::error::Error>> {
    let head = commit(&*store, &[], &[("file.txt", "content\n")], "Commit A");
    let objects_before = store.len();

    let options = MergeOptions {
        fast_forward,
        ..MergeOptions::default()
    };
    let outcome = Merger::new(store.clone())
        .perform_merge(&head, &head, &options)
        .await?;

    assert_eq!(outcome, MergeOutcome::UpToDate);
    assert_eq!(store.len(), objects_before);
    Ok(())
}
