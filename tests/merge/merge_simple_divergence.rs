use crate::common::history::{commit, files, read_files, store};
use bit_merge::areas::store::{MemoryStore, ObjectStore};
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::markers::parse_conflicts;
use bit_merge::artifacts::merge::options::{FastForwardStrategy, MergeFileFlags, MergeOptions};
use bit_merge::artifacts::merge::outcome::{ConflictKind, MergeOutcome, MergeSide};
use bit_merge::artifacts::objects::commit::Author;
use bit_merge::artifacts::objects::object_id::ObjectId;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

/// History:
///       A
///      / \
///     B   C
///   ours  theirs
fn diverged(
    store: &MemoryStore,
    ancestor: &[(&str, &str)],
    ours: &[(&str, &str)],
    theirs: &[(&str, &str)],
) -> (ObjectId, ObjectId) {
    let a = commit(store, &[], ancestor, "Commit A");
    let b = commit(store, &[&a], ours, "Commit B");
    let c = commit(store, &[&a], theirs, "Commit C");
    (b, c)
}

#[rstest]
#[tokio::test]
async fn disjoint_changes_merge_cleanly(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = diverged(
        &store,
        &[("file.txt", "a\nb\nc\n"), ("docs/readme.md", "hello\n")],
        &[("file.txt", "a\nB\nc\n"), ("docs/readme.md", "hello\n")],
        &[
            ("file.txt", "a\nb\nC\n"),
            ("docs/readme.md", "hello\n"),
            ("docs/guide.md", "guide\n"),
        ],
    );

    let options = MergeOptions {
        message: Some("Merge branch 'feature'".to_string()),
        author: Some(Author::new("Grace".to_string(), "grace@example.com".to_string())),
        ..MergeOptions::default()
    };
    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options)
        .await?;

    let MergeOutcome::Merged(merge) = outcome else {
        panic!("expected a merge commit, got {:?}", outcome);
    };
    let merge_commit = store.get_commit(&merge)?;
    assert_eq!(merge_commit.parents(), &[ours, theirs]);
    assert_eq!(merge_commit.message(), "Merge branch 'feature'");
    assert_eq!(merge_commit.author().name(), "Grace");
    assert_eq!(merge_commit.committer().name(), "Grace");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[
            ("docs/guide.md", "guide\n"),
            ("docs/readme.md", "hello\n"),
            ("file.txt", "a\nB\nC\n"),
        ])
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn conflicting_changes_write_nothing(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = diverged(
        &store,
        &[("file.txt", "x\n"), ("gone.txt", "old\n")],
        &[("file.txt", "y\n")],
        &[("file.txt", "z\n"), ("gone.txt", "changed\n")],
    );
    let objects_before = store.len();

    let options = MergeOptions {
        file_flags: MergeFileFlags::STYLE_DIFF3,
        ..MergeOptions::default()
    };
    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options)
        .await?;

    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert_eq!(result.conflicted_paths(), vec!["file.txt", "gone.txt"]);
    assert_eq!(result.conflicts[0].kind, ConflictKind::Content);
    assert_eq!(
        result.conflicts[1].kind,
        ConflictKind::ModifyDelete {
            deleted_by: MergeSide::Ours
        }
    );

    let content = result.conflicts[0].content.as_ref().expect("content merge");
    let parsed = parse_conflicts(content.content());
    assert_eq!(parsed.len(), 1);
    assert_eq!(parsed[0].ours(content.content()), b"y\n");
    assert_eq!(parsed[0].theirs(content.content()), b"z\n");
    assert_eq!(parsed[0].ancestor(content.content()), Some(&b"x\n"[..]));

    assert_eq!(store.len(), objects_before);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn conflicted_result_can_be_persisted_on_request(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = diverged(
        &store,
        &[("file.txt", "x\n"), ("kept.txt", "k\n")],
        &[("file.txt", "y\n"), ("kept.txt", "k\n")],
        &[("file.txt", "z\n"), ("kept.txt", "k\n")],
    );

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await?;
    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert!(!store.contains(&result.tree)?);

    result.write_to(&*store)?;

    let marked = result.conflicts[0].marked_blob.as_ref().expect("marked blob");
    assert!(store.contains(&result.tree)?);
    assert_eq!(
        store.get_blob(marked)?.content().as_ref(),
        b"<<<<<<< ours\ny\n=======\nz\n>>>>>>> theirs\n"
    );
    assert!(store.get_tree(&result.tree)?.get("kept.txt").is_some());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn conflict_paths_do_not_depend_on_direction(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (left, right) = diverged(
        &store,
        &[("a.txt", "1\n2\n3\n"), ("b.txt", "b\n"), ("c.txt", "c\n")],
        &[("a.txt", "1\nleft\n3\n"), ("b.txt", "b left\n"), ("c.txt", "c\n")],
        &[("a.txt", "1\nright\n3\n"), ("b.txt", "b\n"), ("d.txt", "d\n")],
    );
    let merger = Merger::new(store.clone());

    let forward = merger
        .perform_merge(&left, &right, &MergeOptions::default())
        .await?;
    let backward = merger
        .perform_merge(&right, &left, &MergeOptions::default())
        .await?;

    let (MergeOutcome::Conflicts(forward), MergeOutcome::Conflicts(backward)) = (forward, backward)
    else {
        panic!("expected conflicts in both directions");
    };
    assert_eq!(forward.conflicted_paths(), vec!["a.txt"]);
    assert_eq!(forward.conflicted_paths(), backward.conflicted_paths());
    Ok(())
}

#[rstest]
#[tokio::test]
async fn repeated_merges_produce_the_same_commit(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = diverged(
        &store,
        &[("file.txt", "a\nb\nc\n")],
        &[("file.txt", "a\nB\nc\n"), ("ours.txt", "ours\n")],
        &[("file.txt", "a\nb\nC\n"), ("theirs.txt", "theirs\n")],
    );
    let options = MergeOptions {
        author: Some(crate::common::history::author()),
        ..MergeOptions::default()
    };

    let first = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options)
        .await?;
    let second = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options)
        .await?;

    assert!(first.commit().is_some());
    assert_eq!(first, second);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn fast_forward_only_refuses_diverged_histories(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = diverged(
        &store,
        &[("file.txt", "a\n")],
        &[("file.txt", "b\n")],
        &[("file.txt", "a\n"), ("new.txt", "new\n")],
    );
    let objects_before = store.len();

    let options = MergeOptions {
        fast_forward: FastForwardStrategy::FastForwardOnly,
        ..MergeOptions::default()
    };
    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options)
        .await?;

    assert_eq!(outcome, MergeOutcome::NonFastForwardable);
    assert_eq!(store.len(), objects_before);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn unrelated_histories_merge_without_an_ancestor(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let ours = commit(&*store, &[], &[("ours.txt", "ours\n")], "Root A");
    let theirs = commit(&*store, &[], &[("theirs.txt", "theirs\n")], "Root B");

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[("ours.txt", "ours\n"), ("theirs.txt", "theirs\n")])
    );
    Ok(())
}
