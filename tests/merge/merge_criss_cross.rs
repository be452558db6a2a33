use crate::common::history::{commit, files, read_files, store};
use bit_merge::areas::store::MemoryStore;
use bit_merge::artifacts::merge::driver::Merger;
use bit_merge::artifacts::merge::merge_base::MergeBaseResolver;
use bit_merge::artifacts::merge::options::MergeOptions;
use bit_merge::artifacts::objects::object_id::ObjectId;
use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::Arc;

struct CrissCross {
    b: ObjectId,
    c: ObjectId,
    f: ObjectId,
    g: ObjectId,
}

/// History:
///       A
///      / \
///     B   C
///     |\ /|
///     | X |
///     |/ \|
///     D   E
///     |   |
///     F   G
///
/// D and E both merge B and C, so F and G have two best common ancestors.
fn criss_cross(
    store: &MemoryStore,
    b_file: &str,
    c_file: &str,
    resolved: &str,
    f_file: &str,
) -> CrissCross {
    let a = commit(store, &[], &[("file.txt", "1\n2\n3\n4\n5\n")], "Commit A");
    let b = commit(store, &[&a], &[("file.txt", b_file)], "Commit B");
    let c = commit(store, &[&a], &[("file.txt", c_file)], "Commit C");
    let d = commit(store, &[&b, &c], &[("file.txt", resolved)], "Commit D");
    let e = commit(store, &[&c, &b], &[("file.txt", resolved)], "Commit E");
    let f = commit(store, &[&d], &[("file.txt", f_file)], "Commit F");
    let g = commit(
        store,
        &[&e],
        &[("file.txt", resolved), ("g.txt", "from G\n")],
        "Commit G",
    );

    CrissCross { b, c, f, g }
}

#[rstest]
fn criss_cross_has_two_merge_bases(store: Arc<MemoryStore>) -> Result<(), Box<dyn std::error::Error>> {
    let history = criss_cross(
        &store,
        "B\n2\n3\n4\n5\n",
        "1\n2\n3\n4\nC\n",
        "B\n2\n3\n4\nC\n",
        "B\n2\nF\n4\nC\n",
    );

    let bases = MergeBaseResolver::new(&*store).merge_bases(&history.f, &history.g)?;

    let mut expected = vec![history.b, history.c];
    expected.sort();
    assert_eq!(bases, expected);
    Ok(())
}

#[rstest]
#[tokio::test]
async fn criss_cross_merges_through_a_virtual_base(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let history = criss_cross(
        &store,
        "B\n2\n3\n4\n5\n",
        "1\n2\n3\n4\nC\n",
        "B\n2\n3\n4\nC\n",
        "B\n2\nF\n4\nC\n",
    );

    let outcome = Merger::new(store.clone())
        .perform_merge(&history.f, &history.g, &MergeOptions::default())
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[("file.txt", "B\n2\nF\n4\nC\n"), ("g.txt", "from G\n")])
    );
    Ok(())
}

#[rstest]
#[tokio::test]
async fn conflicting_bases_are_embedded_in_the_virtual_base(
    store: Arc<MemoryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    // B and C disagree on the first line; D and E settled it the same way
    let history = criss_cross(
        &store,
        "B\n2\n3\n4\n5\n",
        "C\n2\n3\n4\n5\n",
        "BC\n2\n3\n4\n5\n",
        "BC\n2\n3\n4\n5\n",
    );
    let objects_before = store.len();

    let outcome = Merger::new(store.clone())
        .perform_merge(&history.f, &history.g, &MergeOptions::default())
        .await?;

    let merge = outcome.commit().cloned().expect("merge commit");
    assert_eq!(
        read_files(&*store, &merge),
        files(&[("file.txt", "BC\n2\n3\n4\n5\n"), ("g.txt", "from G\n")])
    );
    // the merged tree is G's; the virtual base and its marked blob stay out
    assert_eq!(store.len(), objects_before + 1);
    Ok(())
}
