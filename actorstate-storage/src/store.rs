//! Remote state store seam.
//!
//! The transport (HTTP, gRPC, auth headers, retries) lives behind this trait.
//! Everything above it only needs point reads and one ordered batch write.

use std::future::Future;
use std::sync::Arc;

use ::async_trait::async_trait;
use actorstate_core::{ActorRef, StateError, StateOperation, StateResult, StoredState};
use tokio_util::sync::CancellationToken;

/// Async client for the remote key-value store holding actor state.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Point read of one state name.
    ///
    /// Returns `Ok(None)` when the store has no value. The store may return
    /// a value whose expiry has already passed; callers treat it as absent.
    async fn read_state(&self, actor: &ActorRef, name: &str) -> StateResult<Option<StoredState>>;

    /// Apply `operations` atomically and in array order.
    async fn commit_batch(
        &self,
        actor: &ActorRef,
        operations: &[StateOperation],
    ) -> StateResult<()>;
}

#[async_trait]
impl<S: StateStore + ?Sized> StateStore for Arc<S> {
    async fn read_state(&self, actor: &ActorRef, name: &str) -> StateResult<Option<StoredState>> {
        (**self).read_state(actor, name).await
    }

    async fn commit_batch(
        &self,
        actor: &ActorRef,
        operations: &[StateOperation],
    ) -> StateResult<()> {
        (**self).commit_batch(actor, operations).await
    }
}

/// Race `operation` against the caller's cancellation signal.
///
/// A token that has already fired short-circuits before the operation is
/// polled, so nothing reaches the store.
pub(crate) async fn cancellable<T, F>(cancel: &CancellationToken, operation: F) -> StateResult<T>
where
    F: Future<Output = StateResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(StateError::Cancelled);
    }

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StateError::Cancelled),
        result = operation => result,
    }
}
