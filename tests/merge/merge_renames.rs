use crate::common::file::generated_lines;
use crate::common::history::{commit, files, read_files, store};
use bit_merge::areas::store::{MemoryStore, ObjectStore};
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::options::MergeOptions;
use bit_merge::artifacts::merge::outcome::{ConflictKind, MergeOutcome, MergeSide};
use bit_merge::artifacts::objects::object_id::ObjectId;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

const BODY: &str = "one\ntwo\nthree\nfour\nfive\nsix\nseven\neight\nnine\nten\n";
const MODIFIED: &str = "one\ntwo\nthree\nfour\nFIVE\nsix\nseven\neight\nnine\nten\n";

/// Ours moves `old.txt` to `src/new.txt`, theirs edits `old.txt`
fn rename_and_modify(store: &MemoryStore) -> (ObjectId, ObjectId) {
    let a = commit(
        store,
        &[],
        &[("old.txt", BODY), ("other.txt", "other\n")],
        "Commit A",
    );
    let ours = commit(
        store,
        &[&a],
        &[("src/new.txt", BODY), ("other.txt", "other\n")],
        "Rename",
    );
    let theirs = commit(
        store,
        &[&a],
        &[("old.txt", MODIFIED), ("other.txt", "other\n")],
        "Modify",
    );
    (ours, theirs)
}

#[rstest]
#[tokio::test]
async fn modification_follows_the_rename(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = rename_and_modify(&store);

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[("other.txt", "other\n"), ("src/new.txt", MODIFIED)])
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn rename_merges_the_same_from_either_side(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (renamed, modified) = rename_and_modify(&store);

    let outcome = Merger::new(store.clone())
        .perform_merge(&modified, &renamed, &MergeOptions::default())
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[("other.txt", "other\n"), ("src/new.txt", MODIFIED)])
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn without_rename_detection_the_move_is_a_delete(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let (ours, theirs) = rename_and_modify(&store);

    let options = MergeOptions {
        find_renames: false,
        ..MergeOptions::default()
    };
    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &options)
        .await?;

    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert_eq!(result.conflicted_paths(), vec!["old.txt"]);
    assert_eq!(
        result.conflicts[0].kind,
        ConflictKind::ModifyDelete {
            deleted_by: MergeSide::Ours
        }
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn inexact_rename_with_generated_content(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let head = generated_lines(20);
    let tail = generated_lines(20);
    let original = format!("{}{}", head, tail);
    let moved = format!("{}{}moved\n", head, tail);
    let edited = format!("{}edited\n{}", head, tail);

    let a = commit(&*store, &[], &[("lib.rs", &original)], "Commit A");
    let ours = commit(&*store, &[&a], &[("core/lib.rs", &moved)], "Move");
    let theirs = commit(&*store, &[&a], &[("lib.rs", &edited)], "Edit");

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    let merged = read_files(&*store, &merge);
    assert_eq!(merged.keys().collect::<Vec<_>>(), vec!["core/lib.rs"]);
    assert_eq!(merged["core/lib.rs"], format!("{}edited\n{}moved\n", head, tail));
    Ok(())
}

#[rstest]
#[tokio::test]
async fn rename_against_delete_conflicts(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let a = commit(&*store, &[], &[("old.txt", BODY), ("keep.txt", "k\n")], "Commit A");
    let ours = commit(
        &*store,
        &[&a],
        &[("new.txt", BODY), ("keep.txt", "k\n")],
        "Rename",
    );
    let theirs = commit(&*store, &[&a], &[("keep.txt", "k\n")], "Delete");

    let outcome = Merger::new(store.clone())
        .perform_merge(&ours, &theirs, &MergeOptions::default())
        .await?;

    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert_eq!(result.conflicts.len(), 1);
    assert_eq!(result.conflicts[0].kind, ConflictKind::RenameDelete);
    Ok(())
}

const ADDED: &str = "an unrelated file\nthat happens to share the name\n";

/// Merge `renamer` and `other`, renamer first unless `swapped`
async fn merge_either_way(
    store: &Arc<MemoryStore>,
    renamer: &ObjectId,
    other: &ObjectId,
    swapped: bool,
) -> Result<MergeOutcome, Box<dyn std::error::Error>> {
    let (ours, theirs) = if swapped { (other, renamer) } else { (renamer, other) };
    Ok(Merger::new(store.clone())
        .perform_merge(ours, theirs, &MergeOptions::default())
        .await?)
}

#[rstest]
#[case::renamed_by_ours(false)]
#[case::renamed_by_theirs(true)]
#[tokio::test]
async fn rename_onto_an_added_file_keeps_both(
    store: Arc<MemoryStore>,
    #[case] swapped: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let a = commit(&*store, &[], &[("old.txt", BODY)], "Commit A");
    let renamer = commit(&*store, &[&a], &[("new.txt", BODY)], "Rename");
    let other = commit(
        &*store,
        &[&a],
        &[("old.txt", MODIFIED), ("new.txt", ADDED)],
        "Modify and add",
    );
    let objects_before = store.len();

    let outcome = merge_either_way(&store, &renamer, &other, swapped).await?;

    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert_eq!(result.conflicted_paths(), vec!["new.txt", "old.txt"]);
    assert_eq!(result.conflicts[0].kind, ConflictKind::RenameAdd);
    assert!(matches!(
        result.conflicts[1].kind,
        ConflictKind::ModifyDelete { .. }
    ));

    let rename_add = &result.conflicts[0];
    let added = if swapped { &rename_add.ours } else { &rename_add.theirs };
    assert_eq!(added.as_ref().expect("added side").path, "new.txt");
    assert_eq!(store.len(), objects_before);
    Ok(())
}

#[rstest]
#[case::renamed_by_ours(false)]
#[case::renamed_by_theirs(true)]
#[tokio::test]
async fn rename_against_delete_and_add_records_the_added_file(
    store: Arc<MemoryStore>,
    #[case] swapped: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let a = commit(&*store, &[], &[("old.txt", BODY)], "Commit A");
    let renamer = commit(&*store, &[&a], &[("new.txt", BODY)], "Rename");
    let other = commit(&*store, &[&a], &[("new.txt", ADDED)], "Delete and add");

    let outcome = merge_either_way(&store, &renamer, &other, swapped).await?;

    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert_eq!(result.conflicted_paths(), vec!["new.txt"]);
    let conflict = &result.conflicts[0];
    assert_eq!(conflict.kind, ConflictKind::RenameDelete);
    assert_eq!(conflict.ancestor.as_ref().expect("ancestor").path, "old.txt");

    let (renamed, added) = if swapped {
        (&conflict.theirs, &conflict.ours)
    } else {
        (&conflict.ours, &conflict.theirs)
    };
    let renamed = renamed.as_ref().expect("renamed side");
    let added = added.as_ref().expect("added side");
    assert_ne!(renamed.oid, added.oid);
    assert_eq!(
        store.get_blob(&added.oid)?.content().as_ref(),
        ADDED.as_bytes()
    );
    Ok(())
}

#[rstest]
#[case::added_by_theirs(false)]
#[case::added_by_ours(true)]
#[tokio::test]
async fn rename_rename_with_an_added_destination(
    store: Arc<MemoryStore>,
    #[case] swapped: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let a = commit(&*store, &[], &[("old.txt", BODY)], "Commit A");
    let to_left = commit(&*store, &[&a], &[("left.txt", BODY)], "Rename left");
    let to_right = commit(
        &*store,
        &[&a],
        &[("right.txt", BODY), ("left.txt", ADDED)],
        "Rename right and add left",
    );

    let outcome = merge_either_way(&store, &to_left, &to_right, swapped).await?;

    let MergeOutcome::Conflicts(result) = outcome else {
        panic!("expected conflicts, got {:?}", outcome);
    };
    assert_eq!(result.conflicted_paths(), vec!["left.txt", "old.txt"]);
    assert_eq!(result.conflicts[0].kind, ConflictKind::RenameAdd);
    assert_eq!(result.conflicts[1].kind, ConflictKind::RenameRename);

    let rename_add = &result.conflicts[0];
    let added = if swapped { &rename_add.ours } else { &rename_add.theirs };
    let added = added.as_ref().expect("added side");
    assert_eq!(
        store.get_blob(&added.oid)?.content().as_ref(),
        ADDED.as_bytes()
    );
    Ok(())
}
