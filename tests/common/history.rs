//! Builders for commit histories in any object store

use bit_merge::areas::store::{MemoryStore, ObjectStore};
use bit_merge::artifacts::objects::blob::Blob;
use bit_merge::artifacts::objects::commit::{Author, Commit};
use bit_merge::artifacts::objects::entry_mode::EntryMode;
use bit_merge::artifacts::objects::object_id::ObjectId;
use bit_merge::artifacts::objects::tree::{TreeBuilder, TreeEntry};
use chrono::TimeZone;
use rstest::fixture;
use std::collections::BTreeMap;
use std::sync::Arc;

#[fixture]
pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn author() -> Author {
    let timestamp = chrono::FixedOffset::east_opt(3600)
        .and_then(|offset| offset.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).single())
        .expect("valid timestamp");

    Author::new_with_timestamp("Ada".to_string(), "ada@example.com".to_string(), timestamp)
}

/// Write a tree holding `files` (`path`, `content`), nested on `/`
pub fn write_tree(store: &dyn ObjectStore, files: &[(&str, &str)]) -> ObjectId {
    let entries = files
        .iter()
        .map(|(path, content)| {
            let oid = store
                .put_blob(&Blob::new(content.to_string()))
                .expect("Failed to store blob");
            (path.to_string(), TreeEntry::new(oid, EntryMode::Regular))
        })
        .collect::<Vec<_>>();

    TreeBuilder::build(entries)
        .expect("Failed to nest tree entries")
        .write(&mut |tree| store.put_tree(&tree))
        .expect("Failed to store tree")
}

pub fn commit(
    store: &dyn ObjectStore,
    parents: &[&ObjectId],
    files: &[(&str, &str)],
    message: &str,
) -> ObjectId {
    let tree = write_tree(store, files);
    commit_tree(store, parents, tree, message)
}

pub fn commit_tree(
    store: &dyn ObjectStore,
    parents: &[&ObjectId],
    tree: ObjectId,
    message: &str,
) -> ObjectId {
    let commit = Commit::new(
        parents.iter().map(|oid| (*oid).clone()).collect(),
        tree,
        author(),
        message.to_string(),
    );

    store.put_commit(&commit).expect("Failed to store commit")
}

/// Every file of a commit's tree, by full path
pub fn read_files(store: &dyn ObjectStore, commit: &ObjectId) -> BTreeMap<String, String> {
    let tree = store
        .get_commit(commit)
        .expect("Failed to load commit")
        .tree_oid()
        .clone();

    let mut files = BTreeMap::new();
    collect_files(store, &tree, "", &mut files);
    files
}

fn collect_files(
    store: &dyn ObjectStore,
    tree: &ObjectId,
    prefix: &str,
    files: &mut BTreeMap<String, String>,
) {
    let tree = store.get_tree(tree).expect("Failed to load tree");

    for (name, entry) in tree.into_entries() {
        let path = match prefix {
            "" => name.to_string(),
            prefix => format!("{}/{}", prefix, name),
        };

        if entry.is_tree() {
            collect_files(store, &entry.oid, &path, files);
        } else {
            let blob = store.get_blob(&entry.oid).expect("Failed to load blob");
            files.insert(path, String::from_utf8_lossy(blob.content()).to_string());
        }
    }
}

pub fn files(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect()
}
