//! Staging overlay
//!
//! A merge never writes to the backing store while it runs. Every object it
//! creates (merged blobs, rebuilt trees, virtual base commits, the merge
//! commit) lands in a [`StagedStore`], which reads through to the backing
//! store for everything else.
//!
//! Once the merge is known to be clean, [`StagedStore::flush_reachable`]
//! copies only the objects reachable from the final commit into the backing
//! store. Intermediate objects (virtual bases, their embedded conflict
//! blobs) are dropped with the overlay. A cancelled or failed merge simply
//! drops the overlay and leaves the backing store untouched.

use crate::areas::store::{ObjectStore, into_malformed};
use crate::artifacts::objects::object::ObjectBox;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::MergeResult;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

pub struct StagedStore {
    backing: Arc<dyn ObjectStore>,
    staged: RwLock<HashMap<ObjectId, Bytes>>,
}

impl StagedStore {
    pub fn new(backing: Arc<dyn ObjectStore>) -> Self {
        StagedStore {
            backing,
            staged: RwLock::new(HashMap::new()),
        }
    }

    pub fn backing(&self) -> &Arc<dyn ObjectStore> {
        &self.backing
    }

    pub fn staged_len(&self) -> usize {
        self.staged
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn staged_bytes(&self, oid: &ObjectId) -> Option<Bytes> {
        self.staged
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(oid)
            .cloned()
    }

    /// Staged objects reachable from `roots`
    ///
    /// The walk stops at objects that are not staged: those already live in
    /// the backing store, together with everything below them.
    pub fn collect_reachable(&self, roots: &[ObjectId]) -> MergeResult<BTreeMap<ObjectId, Bytes>> {
        let mut reachable = BTreeMap::new();
        let mut pending = roots.to_vec();

        while let Some(oid) = pending.pop() {
            if reachable.contains_key(&oid) {
                continue;
            }
            let Some(serialized) = self.staged_bytes(&oid) else {
                continue;
            };

            match ObjectBox::parse(&serialized).map_err(|err| into_malformed(&oid, err))? {
                ObjectBox::Tree(tree) => {
                    pending.extend(tree.entries().values().map(|entry| entry.oid.clone()))
                }
                ObjectBox::Commit(commit) => pending.push(commit.tree_oid().clone()),
                ObjectBox::Blob(_) => {}
            }

            reachable.insert(oid, serialized);
        }

        Ok(reachable)
    }

    /// Persist the staged objects reachable from `roots` into the backing store
    ///
    /// Children are written before the objects that reference them.
    pub fn flush_reachable(&self, roots: &[ObjectId]) -> MergeResult<usize> {
        let reachable = self.collect_reachable(roots)?;
        let count = reachable.len();

        write_objects(&*self.backing, &reachable)?;

        tracing::debug!(count, "flushed staged objects");
        Ok(count)
    }
}

/// Write blobs first, then trees, then commits
pub(crate) fn write_objects(
    store: &dyn ObjectStore,
    objects: &BTreeMap<ObjectId, Bytes>,
) -> MergeResult<()> {
    for prefix in [&b"blob "[..], b"tree ", b"commit "] {
        for (oid, serialized) in objects {
            if serialized.starts_with(prefix) {
                store.store(oid, serialized.clone())?;
            }
        }
    }
    Ok(())
}

impl ObjectStore for StagedStore {
    fn load(&self, oid: &ObjectId) -> MergeResult<Bytes> {
        match self.staged_bytes(oid) {
            Some(serialized) => Ok(serialized),
            None => self.backing.load(oid),
        }
    }

    fn store(&self, oid: &ObjectId, serialized: Bytes) -> MergeResult<()> {
        self.staged
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(oid.clone())
            .or_insert(serialized);
        Ok(())
    }

    fn contains(&self, oid: &ObjectId) -> MergeResult<bool> {
        if self.staged_bytes(oid).is_some() {
            return Ok(true);
        }
        self.backing.contains(oid)
    }
}

impl std::fmt::Debug for StagedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagedStore")
            .field("staged", &self.staged_len())
            .finish()
    }
}
