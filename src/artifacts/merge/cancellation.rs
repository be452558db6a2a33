//! Cooperative cancellation of a running merge

use crate::errors::{MergeError, MergeResult};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A token that can be used to check if a merge has been cancelled
///
/// Clones share the same flag, so a token handed to the merge can be
/// cancelled from another task or thread.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the token has been cancelled
    pub fn check(&self) -> MergeResult<()> {
        if self.is_cancelled() {
            Err(MergeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
