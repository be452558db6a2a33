//! Error types for the merge engine
//!
//! Failures fall into two families:
//!
//! - **Lookup**: the object store cannot produce a referenced object
//!   (missing object, I/O failure). Fatal to the running merge.
//! - **Malformed input**: an object exists but cannot be interpreted (bad
//!   header, invalid entry mode, a tree that contains itself), or an object
//!   that cannot be serialized for storage. Also fatal, but reported
//!   distinctly so callers can tell corruption from absence.
//!
//! Conflicts and fast-forward policy outcomes are *not* errors; they are
//! returned as [`MergeOutcome`](crate::artifacts::merge::outcome::MergeOutcome)
//! values.

use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use thiserror::Error;

pub type MergeResult<T> = Result<T, MergeError>;

#[derive(Debug, Error)]
pub enum MergeError {
    /// The object store has no object with this id.
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    /// The object store failed while reading or writing.
    #[error("object store I/O failure: {0}")]
    Io(#[from] std::io::Error),

    /// The object exists but its bytes cannot be parsed.
    #[error("malformed object {oid}: {reason}")]
    Malformed { oid: ObjectId, reason: String },

    /// The object exists but is not of the requested kind.
    #[error("object {oid} is a {actual}, expected a {expected}")]
    UnexpectedObjectType {
        oid: ObjectId,
        expected: ObjectType,
        actual: ObjectType,
    },

    /// A tree entry carries a mode outside the supported set.
    #[error("invalid entry mode {mode} at '{path}'")]
    InvalidMode { path: String, mode: String },

    /// An object could not be turned into its stored form.
    #[error("unable to serialize {kind} object: {reason}")]
    Serialize { kind: ObjectType, reason: String },

    /// A tree was reached again while it was still being walked.
    #[error("tree cycle detected at '{path}' ({oid})")]
    TreeCycle { path: String, oid: ObjectId },

    /// The merge was cancelled cooperatively; nothing was persisted.
    #[error("merge cancelled")]
    Cancelled,

    /// A content-merge worker died before reporting a result.
    #[error("merge worker failed: {0}")]
    Worker(String),
}

impl MergeError {
    pub fn malformed(oid: &ObjectId, reason: impl std::fmt::Display) -> Self {
        MergeError::Malformed {
            oid: oid.clone(),
            reason: reason.to_string(),
        }
    }

    /// Whether the failure comes from an object that could not be looked up
    pub fn is_lookup(&self) -> bool {
        matches!(self, MergeError::ObjectNotFound(_) | MergeError::Io(_))
    }

    /// Whether the failure comes from input that could not be interpreted
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            MergeError::Malformed { .. }
                | MergeError::UnexpectedObjectType { .. }
                | MergeError::InvalidMode { .. }
                | MergeError::Serialize { .. }
                | MergeError::TreeCycle { .. }
        )
    }
}
