//! Results of tree merges and of whole merges
//!
//! Conflicts are values, not errors: a [`TreeMergeResult`] carries every
//! per-path conflict record, and the driver reports them through
//! [`MergeOutcome::Conflicts`].

use crate::areas::staging::write_objects;
use crate::areas::store::ObjectStore;
use crate::artifacts::merge::file_merge::FileMergeResult;
use crate::artifacts::objects::entry_mode::EntryMode;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::TreeEntry;
use crate::errors::MergeResult;
use bstr::{BStr, BString, ByteSlice};
use bytes::Bytes;
use derive_new::new;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MergeSide {
    Ours,
    Theirs,
}

impl std::fmt::Display for MergeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeSide::Ours => write!(f, "ours"),
            MergeSide::Theirs => write!(f, "theirs"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConflictKind {
    /// Both sides changed the same lines differently
    Content,
    /// Both sides added different content at the same path
    AddAdd,
    /// One side deleted what the other modified
    ModifyDelete { deleted_by: MergeSide },
    /// File, symlink and submodule changed into one another
    TypeChange,
    /// File modes that cannot be reconciled
    Mode,
    /// The same path renamed differently on the two sides
    RenameRename,
    /// Renamed on one side, deleted on the other; the deleting side's
    /// record holds whatever it added at the destination
    RenameDelete,
    /// Renamed onto a path the other side added
    RenameAdd,
    /// A file where the other side needs a directory
    DirectoryFile,
}

impl ConflictKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictKind::Content => "content",
            ConflictKind::AddAdd => "add/add",
            ConflictKind::ModifyDelete { .. } => "modify/delete",
            ConflictKind::TypeChange => "type change",
            ConflictKind::Mode => "mode",
            ConflictKind::RenameRename => "rename/rename",
            ConflictKind::RenameDelete => "rename/delete",
            ConflictKind::RenameAdd => "rename/add",
            ConflictKind::DirectoryFile => "directory/file",
        }
    }
}

impl std::fmt::Display for ConflictKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictKind::ModifyDelete { deleted_by } => {
                write!(f, "modify/delete (deleted in {})", deleted_by)
            }
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// One side's version of a conflicted path
///
/// `path` differs from the conflict's path when the side renamed it.
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct ConflictSide {
    pub path: BString,
    pub oid: ObjectId,
    pub mode: EntryMode,
}

impl ConflictSide {
    pub fn from_entry(path: impl Into<BString>, entry: &TreeEntry) -> Self {
        ConflictSide::new(path.into(), entry.oid.clone(), entry.mode)
    }

    pub fn entry(&self) -> TreeEntry {
        TreeEntry::new(self.oid.clone(), self.mode)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub path: BString,
    pub kind: ConflictKind,
    pub ancestor: Option<ConflictSide>,
    pub ours: Option<ConflictSide>,
    pub theirs: Option<ConflictSide>,
    /// The attempted content merge, when there was one
    pub content: Option<FileMergeResult>,
    /// Id of the staged marked blob for `content`
    pub marked_blob: Option<ObjectId>,
}

impl Conflict {
    pub fn new(
        path: impl Into<BString>,
        kind: ConflictKind,
        ancestor: Option<ConflictSide>,
        ours: Option<ConflictSide>,
        theirs: Option<ConflictSide>,
    ) -> Self {
        Conflict {
            path: path.into(),
            kind,
            ancestor,
            ours,
            theirs,
            content: None,
            marked_blob: None,
        }
    }

    pub fn with_content(mut self, content: FileMergeResult, marked_blob: ObjectId) -> Self {
        self.content = Some(content);
        self.marked_blob = Some(marked_blob);
        self
    }
}

/// Merged tree plus the conflicts found while building it
#[derive(Debug, Clone)]
pub struct TreeMergeResult {
    /// Root of the merged tree; conflicted paths are left out of it
    pub tree: ObjectId,
    /// Sorted by path
    pub conflicts: Vec<Conflict>,
    /// Staged objects created by the merge (trees, merged and marked blobs)
    objects: BTreeMap<ObjectId, Bytes>,
}

impl TreeMergeResult {
    pub fn new(tree: ObjectId, mut conflicts: Vec<Conflict>, objects: BTreeMap<ObjectId, Bytes>) -> Self {
        conflicts.sort_by(|a, b| a.path.cmp(&b.path));
        TreeMergeResult {
            tree,
            conflicts,
            objects,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflicted_paths(&self) -> Vec<&BStr> {
        self.conflicts.iter().map(|c| c.path.as_bstr()).collect()
    }

    pub fn objects(&self) -> &BTreeMap<ObjectId, Bytes> {
        &self.objects
    }

    /// Persist the merged tree and marked blobs into `store`
    pub fn write_to(&self, store: &dyn ObjectStore) -> MergeResult<()> {
        write_objects(store, &self.objects)
    }
}

impl PartialEq for TreeMergeResult {
    fn eq(&self, other: &Self) -> bool {
        self.tree == other.tree && self.conflicts == other.conflicts
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Nothing to merge: theirs is already contained in ours
    UpToDate,
    /// Ours can simply advance to this commit
    FastForwarded(ObjectId),
    /// A merge commit was created and persisted
    Merged(ObjectId),
    /// The merge stopped on conflicts; nothing was persisted
    Conflicts(TreeMergeResult),
    /// Fast-forward only was requested but is impossible
    NonFastForwardable,
}

impl MergeOutcome {
    pub fn commit(&self) -> Option<&ObjectId> {
        match self {
            MergeOutcome::FastForwarded(oid) | MergeOutcome::Merged(oid) => Some(oid),
            _ => None,
        }
    }
}
