//! Object store interface
//!
//! The merge engine reads and writes objects only through [`ObjectStore`]:
//! raw `load`/`store` of serialized objects keyed by id, plus typed helpers
//! that parse and hash. Writes are content-addressed and idempotent.
//!
//! [`AncestryGraph`] is the commit-graph view the merge base resolver walks;
//! every store provides it by parsing commits.

use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::{Commit, SlimCommit};
use crate::artifacts::objects::object::{Object, ObjectBox};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use crate::errors::{MergeError, MergeResult};
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

pub trait ObjectStore: Send + Sync {
    /// Load the serialized form (`<type> <size>\0<body>`) of an object
    fn load(&self, oid: &ObjectId) -> MergeResult<Bytes>;

    /// Store a serialized object under its id; storing twice is a no-op
    fn store(&self, oid: &ObjectId, serialized: Bytes) -> MergeResult<()>;

    fn contains(&self, oid: &ObjectId) -> MergeResult<bool>;

    fn parse_object(&self, oid: &ObjectId) -> MergeResult<ObjectBox> {
        let serialized = self.load(oid)?;
        ObjectBox::parse(&serialized).map_err(|err| into_malformed(oid, err))
    }

    fn get_blob(&self, oid: &ObjectId) -> MergeResult<Blob> {
        match self.parse_object(oid)? {
            ObjectBox::Blob(blob) => Ok(*blob),
            other => Err(unexpected(oid, ObjectType::Blob, other.object_type())),
        }
    }

    fn get_tree(&self, oid: &ObjectId) -> MergeResult<Tree> {
        match self.parse_object(oid)? {
            ObjectBox::Tree(tree) => Ok(*tree),
            other => Err(unexpected(oid, ObjectType::Tree, other.object_type())),
        }
    }

    fn get_commit(&self, oid: &ObjectId) -> MergeResult<Commit> {
        match self.parse_object(oid)? {
            ObjectBox::Commit(commit) => Ok(*commit),
            other => Err(unexpected(oid, ObjectType::Commit, other.object_type())),
        }
    }

    fn put_blob(&self, blob: &Blob) -> MergeResult<ObjectId> {
        put(self, blob)
    }

    fn put_tree(&self, tree: &Tree) -> MergeResult<ObjectId> {
        put(self, tree)
    }

    fn put_commit(&self, commit: &Commit) -> MergeResult<ObjectId> {
        put(self, commit)
    }
}

fn put<S: ObjectStore + ?Sized>(store: &S, object: &impl Object) -> MergeResult<ObjectId> {
    let serialized = object.serialize().map_err(|err| MergeError::Serialize {
        kind: object.object_type(),
        reason: format!("{:#}", err),
    })?;
    let oid = ObjectId::hash(&serialized);

    store.store(&oid, serialized)?;
    Ok(oid)
}

fn unexpected(oid: &ObjectId, expected: ObjectType, actual: ObjectType) -> MergeError {
    MergeError::UnexpectedObjectType {
        oid: oid.clone(),
        expected,
        actual,
    }
}

/// Keep typed parse errors (invalid mode) and wrap everything else
pub(crate) fn into_malformed(oid: &ObjectId, err: anyhow::Error) -> MergeError {
    match err.downcast::<MergeError>() {
        Ok(merge_error) => merge_error,
        Err(err) => MergeError::malformed(oid, format!("{:#}", err)),
    }
}

/// Commit-graph adjacency as seen by the merge base resolver
pub trait AncestryGraph {
    fn slim_commit(&self, oid: &ObjectId) -> MergeResult<SlimCommit>;

    fn parents_of(&self, oid: &ObjectId) -> MergeResult<Vec<ObjectId>> {
        Ok(self.slim_commit(oid)?.parents)
    }
}

impl<S: ObjectStore + ?Sized> AncestryGraph for S {
    fn slim_commit(&self, oid: &ObjectId) -> MergeResult<SlimCommit> {
        Ok(self.get_commit(oid)?.to_slim(oid.clone()))
    }
}

/// Object store kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectId, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for MemoryStore {
    fn load(&self, oid: &ObjectId) -> MergeResult<Bytes> {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(oid)
            .cloned()
            .ok_or_else(|| MergeError::ObjectNotFound(oid.clone()))
    }

    fn store(&self, oid: &ObjectId, serialized: Bytes) -> MergeResult<()> {
        self.objects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(oid.clone())
            .or_insert(serialized);
        Ok(())
    }

    fn contains(&self, oid: &ObjectId) -> MergeResult<bool> {
        Ok(self
            .objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(oid))
    }
}
