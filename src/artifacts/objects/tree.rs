//! Git tree object
//!
//! Trees represent directory snapshots. They contain entries for files
//! (blobs), symlinks, submodules and subdirectories (other trees), along
//! with their names and modes.
//!
//! ## Format
//!
//! On disk: `tree <size>\0<entries>`
//! Each entry: `<mode> <name>\0<20-byte-sha1>`
//!
//! Entries are kept in a `BTreeMap` keyed by name; serialization uses git's
//! ordering, where a directory sorts as if its name ended with `/`. Names are
//! raw bytes, as git stores them; they need not be UTF-8.
//!
//! ## Tree Building
//!
//! Merges produce a flat `path -> entry` map. [`TreeBuilder`] nests it back
//! into directories and writes the trees bottom-up (post-order), since
//! child ids must be known before the parent can be hashed.

use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::errors::{MergeError, MergeResult};
use anyhow::Context;
use bstr::{BStr, BString, ByteSlice};
use derive_new::new;
use std::collections::BTreeMap;
use std::io::{BufRead, Write};

/// A single named entry of a tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct TreeEntry {
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl TreeEntry {
    pub fn is_tree(&self) -> bool {
        self.mode.is_tree()
    }
}

/// Git tree object representing a directory snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: BTreeMap<BString, TreeEntry>,
}

impl Tree {
    pub fn entries(&self) -> &BTreeMap<BString, TreeEntry> {
        &self.entries
    }

    pub fn into_entries(self) -> impl Iterator<Item = (BString, TreeEntry)> {
        self.entries.into_iter()
    }

    pub fn get(&self, name: impl AsRef<[u8]>) -> Option<&TreeEntry> {
        self.entries.get(BStr::new(name.as_ref()))
    }

    pub fn insert(&mut self, name: impl Into<BString>, entry: TreeEntry) -> Option<TreeEntry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn git_order(&self) -> Vec<(&BString, &TreeEntry)> {
        let mut ordered = self.entries.iter().collect::<Vec<_>>();
        ordered.sort_by(|(a_name, a), (b_name, b)| {
            let a_key = sort_key(a_name, a.is_tree());
            let b_key = sort_key(b_name, b.is_tree());
            a_key.cmp(&b_key)
        });
        ordered
    }
}

fn sort_key(name: &[u8], is_tree: bool) -> Vec<u8> {
    let mut key = name.to_vec();
    if is_tree {
        key.push(b'/');
    }
    key
}

impl<N: Into<BString>> FromIterator<(N, TreeEntry)> for Tree {
    fn from_iter<T: IntoIterator<Item = (N, TreeEntry)>>(iter: T) -> Self {
        Tree {
            entries: iter
                .into_iter()
                .map(|(name, entry)| (name.into(), entry))
                .collect(),
        }
    }
}

impl Packable for Tree {
    fn serialize_body(&self) -> anyhow::Result<Vec<u8>> {
        let mut content_bytes = Vec::new();

        for (name, entry) in self.git_order() {
            write!(content_bytes, "{} ", entry.mode.as_octal())?;
            content_bytes.extend_from_slice(name);
            content_bytes.push(b'\0');
            entry.oid.write_h40_to(&mut content_bytes)?;
        }

        Ok(content_bytes)
    }
}

impl Unpackable for Tree {
    fn deserialize(reader: impl BufRead) -> anyhow::Result<Self> {
        let mut entries = BTreeMap::new();
        let mut reader = reader;

        // Reuse scratch buffers to reduce allocs
        let mut mode_bytes = Vec::new();
        let mut name_bytes = Vec::new();

        loop {
            mode_bytes.clear();
            // Read "mode " (space-delimited)
            let n = reader.read_until(b' ', &mut mode_bytes)?;
            if n == 0 {
                break; // clean EOF: no more entries
            }
            if mode_bytes.pop() != Some(b' ') {
                return Err(anyhow::anyhow!("unexpected EOF in mode"));
            }
            let mode_str = std::str::from_utf8(&mode_bytes)?.to_owned();

            // Read "name\0"
            name_bytes.clear();
            reader.read_until(b'\0', &mut name_bytes)?;
            if name_bytes.pop() != Some(b'\0') {
                return Err(anyhow::anyhow!("unexpected EOF in name"));
            }
            let name = BString::from(name_bytes.as_slice());
            if name.is_empty() || name.contains(&b'/') || name == "." || name == ".." {
                return Err(anyhow::anyhow!("invalid entry name '{}'", name));
            }

            let mode = EntryMode::parse(&mode_str).ok_or_else(|| MergeError::InvalidMode {
                path: name.to_string(),
                mode: mode_str.clone(),
            })?;

            let oid =
                ObjectId::read_h40_from(&mut reader).context("unexpected EOF in object id")?;

            if entries.insert(name.clone(), TreeEntry::new(oid, mode)).is_some() {
                return Err(anyhow::anyhow!("duplicate entry '{}'", name));
            }
        }

        Ok(Tree { entries })
    }
}

impl Object for Tree {
    fn object_type(&self) -> ObjectType {
        ObjectType::Tree
    }
}

#[derive(Debug)]
enum BuilderNode {
    Leaf(TreeEntry),
    Directory(TreeBuilder),
}

/// Nests flat `a/b/c` paths into a tree hierarchy
#[derive(Debug, Default)]
pub struct TreeBuilder {
    children: BTreeMap<BString, BuilderNode>,
}

impl TreeBuilder {
    pub fn build<P: Into<BString>>(
        entries: impl IntoIterator<Item = (P, TreeEntry)>,
    ) -> anyhow::Result<Self> {
        let mut root = Self::default();

        for (path, entry) in entries {
            let path = path.into();
            let segments = path.split_str("/").collect::<Vec<_>>();
            root.add_entry(path.as_bstr(), &segments, entry)?;
        }

        Ok(root)
    }

    fn add_entry(&mut self, path: &BStr, segments: &[&[u8]], entry: TreeEntry) -> anyhow::Result<()> {
        let (name, rest) = segments
            .split_first()
            .with_context(|| format!("empty path '{}'", path))?;
        let name = BStr::new(name);

        if rest.is_empty() {
            if self.children.contains_key(name) {
                return Err(anyhow::anyhow!("path '{}' is both a file and a directory", path));
            }
            self.children
                .insert(name.to_owned(), BuilderNode::Leaf(entry));
            return Ok(());
        }

        let node = self
            .children
            .entry(name.to_owned())
            .or_insert_with(|| BuilderNode::Directory(TreeBuilder::default()));
        match node {
            BuilderNode::Directory(subtree) => subtree.add_entry(path, rest, entry),
            BuilderNode::Leaf(_) => Err(anyhow::anyhow!(
                "path '{}' is both a file and a directory",
                path
            )),
        }
    }

    /// Write the hierarchy bottom-up, returning the root tree id
    ///
    /// # Arguments
    ///
    /// * `write` - Stores one finished tree and returns its id
    pub fn write<F>(self, write: &mut F) -> MergeResult<ObjectId>
    where
        F: FnMut(Tree) -> MergeResult<ObjectId>,
    {
        let mut tree = Tree::default();

        for (name, node) in self.children {
            let entry = match node {
                BuilderNode::Leaf(entry) => entry,
                BuilderNode::Directory(subtree) => {
                    TreeEntry::new(subtree.write(write)?, EntryMode::Directory)
                }
            };
            tree.insert(name, entry);
        }

        write(tree)
    }
}
