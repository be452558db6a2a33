use crate::common::history::{commit, read_files, store};
use bit_merge::areas::config::{FAST_FORWARD_KEY, MergeConfig};
use bit_merge::areas::store::{MemoryStore, ObjectStore};
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::options::{FastForwardStrategy, MergeOptions};
use bit_merge::artifacts::merge::outcome::MergeOutcome;
use bit_merge::artifacts::objects::object_id::ObjectId;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

/// History:
///   A <- B <- C (theirs)
///   ^
///   ours
fn linear(store: &MemoryStore) -> (ObjectId, ObjectId) {
    let a = commit(store, &[], &[("file.txt", "line A\n")], "Commit A");
    let b = commit(store, &[&a], &[("file.txt", "line A\nline B\n")], "Commit B");
    let c = commit(
        store,
        &[&b],
        &[("file.txt", "line A\nline B\nline C\n")],
        "Commit C",
    );
    (a, c)
}

fn options(fast_forward: FastForwardStrategy) -> MergeOptions {
    MergeOptions {
        fast_forward,
        ..MergeOptions::default()
    }
}

#[rstest]
#[tokio::test]
async fn descendant_fast_forwards(store: Arc<MemoryStore>) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = linear(&store);
    let objects_before = store.len();

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options(FastForwardStrategy::Default))
        .await?;

    assert_eq!(outcome, MergeOutcome::FastForwarded(theirs));
    assert_eq!(store.len(), objects_before);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn fast_forward_only_accepts_descendants(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = linear(&store);

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options(FastForwardStrategy::FastForwardOnly))
        .await?;

    assert_eq!(outcome, MergeOutcome::FastForwarded(theirs));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn no_fast_forward_creates_a_merge_commit(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = linear(&store);

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options(FastForwardStrategy::NoFastForward))
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    assert!(matches!(outcome, MergeOutcome::Merged(_)));

    let merge_commit = store.get_commit(&merge)?;
    assert_eq!(merge_commit.parents(), &[ours.clone(), theirs.clone()]);
    assert_eq!(
        merge_commit.tree_oid(),
        store.get_commit(&theirs)?.tree_oid()
    );
    assert_eq!(merge_commit.message(), format!("Merge commit '{}'", theirs));
    assert_eq!(read_files(&*store, &merge), read_files(&*store, &theirs));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn ancestor_is_already_up_to_date(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ancestor, descendant) = linear(&store);

    for strategy in [
        FastForwardStrategy::Default,
        FastForwardStrategy::NoFastForward,
        FastForwardStrategy::FastForwardOnly,
    ] {
        let outcome = Merger::new(store.clone())
            .perform_merge(&descendant, &ancestor, &options(strategy))
            .await?;
        assert_eq!(outcome, MergeOutcome::UpToDate);
    }
    Ok(())
}

#[rstest]
#[tokio::test]
async fn configured_preference_applies_to_the_default_strategy(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = linear(&store);
    let config = MergeConfig::from_lookup(|key| {
        (key == FAST_FORWARD_KEY).then(|| "false".to_string())
    })?;

    let outcome = Merger::new(store.clone())
        .with_config(config)
        .perform_merge(&ours, &theirs, &options(FastForwardStrategy::Default))
        .await?;

    assert!(matches!(outcome, MergeOutcome::Merged(_)));
    Ok(())
}
