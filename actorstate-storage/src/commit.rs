//! Transactional commit of a turn's pending operations.
//!
//! The overlay is serialized in first-touched order into one batch and sent
//! to the store in a single call. Pending operations are cleared only after
//! the store acknowledges the batch; on failure or cancellation they stay
//! staged so the caller can retry the save or abandon the turn.

use actorstate_core::{ActorRef, Clock, StateError, StateOperation, StateResult, Timestamp};
use tokio_util::sync::CancellationToken;

use crate::store::{cancellable, StateStore};
use crate::tracker::StateChangeTracker;

/// Build the ordered batch for the overlay, with TTLs measured from `now`.
pub fn build_batch(tracker: &StateChangeTracker, now: Timestamp) -> Vec<StateOperation> {
    tracker.iter().map(|op| op.to_state_operation(now)).collect()
}

/// Summary of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CommitReport {
    pub upserts: usize,
    pub deletes: usize,
}

impl CommitReport {
    fn of(batch: &[StateOperation]) -> Self {
        let deletes = batch.iter().filter(|op| op.is_delete()).count();
        Self {
            upserts: batch.len() - deletes,
            deletes,
        }
    }

    pub fn operations(&self) -> usize {
        self.upserts + self.deletes
    }
}

/// Send every pending operation to the store as one ordered batch.
///
/// An empty overlay makes no remote call. A batch larger than
/// `max_operations` is refused before anything is sent.
#[tracing::instrument(skip_all, fields(actor = %actor, pending = tracker.len()))]
pub async fn commit<S>(
    store: &S,
    actor: &ActorRef,
    tracker: &mut StateChangeTracker,
    clock: &dyn Clock,
    max_operations: Option<usize>,
    cancel: &CancellationToken,
) -> StateResult<CommitReport>
where
    S: StateStore + ?Sized,
{
    if tracker.is_empty() {
        return Ok(CommitReport::default());
    }

    if let Some(limit) = max_operations {
        if tracker.len() > limit {
            return Err(StateError::BatchTooLarge {
                operations: tracker.len(),
                limit,
            });
        }
    }

    let batch = build_batch(tracker, clock.now());
    let report = CommitReport::of(&batch);
    tracing::info!(operations = batch.len(), "submitting state batch");

    match cancellable(cancel, store.commit_batch(actor, &batch)).await {
        Ok(()) => {
            tracker.clear();
            tracing::info!(
                upserts = report.upserts,
                deletes = report.deletes,
                "state batch committed"
            );
            Ok(report)
        }
        Err(err) => {
            tracing::warn!(error = %err, "state batch not committed, pending operations retained");
            Err(err)
        }
    }
}
