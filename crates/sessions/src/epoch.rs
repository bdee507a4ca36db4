//! The monotonic cancellation epoch (spec §4.8 step 4, §9): superseding
//! a burst bumps the session's epoch, and any in-flight worker holding
//! an older epoch number treats every subsequent checkpoint as a
//! cancellation. Unlike the teacher's boolean `CancelMap`, this uses a
//! counter — a burst can be superseded more than once before any
//! worker reaches a checkpoint, and a single boolean can't distinguish
//! "superseded by the message I already folded in" from "superseded
//! again after that".

use crate::key::KeyBuilder;
use crate::store::KeyValueStore;
use flowline_domain::Error;
use std::sync::Arc;

#[derive(Clone)]
pub struct CancellationEpoch {
    store: Arc<dyn KeyValueStore>,
    keys: KeyBuilder,
}

impl CancellationEpoch {
    pub fn new(store: Arc<dyn KeyValueStore>, keys: KeyBuilder) -> Self {
        Self { store, keys }
    }

    /// Bump the session's epoch, marking any worker holding an earlier
    /// token as superseded. Returns the new epoch value.
    pub async fn bump(&self, session_id: &str) -> Result<i64, Error> {
        self.store.incr(&self.keys.cancel(session_id)).await
    }

    /// The epoch a newly spawned worker should hold before its first
    /// checkpoint — the current value, not a fresh bump.
    pub async fn current(&self, session_id: &str) -> Result<i64, Error> {
        self.store.peek_counter(&self.keys.cancel(session_id)).await
    }

    /// True if `held_epoch` is no longer current — the worker that
    /// captured it has been superseded and must stop at this
    /// checkpoint (spec §4.8's three checkpoints: before the LLM call,
    /// after it, and before sending).
    pub async fn is_cancelled(&self, session_id: &str, held_epoch: i64) -> Result<bool, Error> {
        Ok(self.current(session_id).await? != held_epoch)
    }
}
