use crate::common::history::{commit, commit_tree, store, write_tree};
use bit_merge::areas::store::{MemoryStore, ObjectStore};
use bit_merge::artifacts::merge::cancellation::CancellationToken;
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::options::MergeOptions;
use bit_merge::artifacts::objects::object_id::ObjectId;
use bit_merge::errors::MergeError;
use bytes::Bytes;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

fn diverged(store: &MemoryStore) -> (ObjectId, ObjectId) {
    let a = commit(store, &[], &[("file.txt", "a\nb\nc\n")], "Commit A");
    let b = commit(store, &[&a], &[("file.txt", "a\nB\nc\n")], "Commit B");
    let c = commit(store, &[&a], &[("file.txt", "a\nb\nC\n")], "Commit C");
    (b, c)
}

#[rstest]
#[tokio::test]
async fn cancelled_merge_writes_nothing(store: Arc<MemoryStore>) {
    let (ours, theirs) = diverged(&store);
    let objects_before = store.len();

    let token = CancellationToken::new();
    let merger = Merger::new(store.clone()).with_cancellation(token.clone());
    token.cancel();

    let err = merger
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, MergeError::Cancelled));
    assert_eq!(store.len(), objects_before);
}

#[rstest]
#[tokio::test]
async fn missing_tree_is_a_lookup_error(store: Arc<MemoryStore>) {
    let a = commit(&*store, &[], &[("file.txt", "a\n")], "Commit A");
    let ours = commit(&*store, &[&a], &[("file.txt", "b\n")], "Commit B");

    // the tree only exists in another store
    let elsewhere = MemoryStore::new();
    let missing_tree = write_tree(&elsewhere, &[("file.txt", "c\n")]);
    let theirs = commit_tree(&*store, &[&a], missing_tree.clone(), "Commit C");
    let objects_before = store.len();

    let err = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_lookup());
    assert!(matches!(err, MergeError::ObjectNotFound(oid) if oid == missing_tree));
    assert_eq!(store.len(), objects_before);
}

#[rstest]
#[tokio::test]
async fn missing_parent_is_a_lookup_error(store: Arc<MemoryStore>) {
    let elsewhere = MemoryStore::new();
    let orphan_parent = commit(&elsewhere, &[], &[("file.txt", "a\n")], "Commit A");

    let ours = commit(&*store, &[&orphan_parent], &[("file.txt", "b\n")], "Commit B");
    let theirs = commit(&*store, &[&orphan_parent], &[("file.txt", "c\n")], "Commit C");

    let err = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_lookup());
}

#[rstest]
#[tokio::test]
async fn corrupt_tree_is_malformed_input(store: Arc<MemoryStore>) {
    let a = commit(&*store, &[], &[("file.txt", "a\n")], "Commit A");
    let ours = commit(&*store, &[&a], &[("file.txt", "b\n")], "Commit B");

    let garbage = Bytes::from_static(b"tree 10\0not a tree");
    let corrupt_tree = ObjectId::hash(&garbage);
    store.store(&corrupt_tree, garbage).unwrap();
    let theirs = commit_tree(&*store, &[&a], corrupt_tree, "Commit C");

    let err = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await
        .unwrap_err();

    assert!(err.is_malformed(), "unexpected error: {}", err);
}
