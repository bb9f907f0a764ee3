//! actorstate Test Utilities
//!
//! Shared test infrastructure for the actorstate workspace:
//! - A recording state store with failure and stall injection
//! - Proptest generators for names, payloads and pending operations
//! - Fixtures for common scenarios
//! - Assertions for the error outcomes a turn branches on

// Re-export the in-memory store from its source crate
pub use actorstate_storage::{ActorStateManager, InMemoryStateStore, StateStore};

// Re-export core types for convenience
pub use actorstate_core::{
    encode_batch, ActorRef, ChangeKind, Clock, ManualClock, PendingOperation, RemoteError,
    StateConfig, StateError, StateOperation, StateResult, StateValue, StoredState, Timestamp,
};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

// ============================================================================
// RECORDING STORE
// ============================================================================

/// State store that records every call it receives.
///
/// Wraps an [`InMemoryStateStore`] and can be told to fail or stall reads and
/// commits, so tests can observe what the manager sends and how it reacts.
#[derive(Debug, Default)]
pub struct RecordingStateStore {
    inner: InMemoryStateStore,
    reads: Mutex<Vec<String>>,
    batches: Mutex<Vec<Vec<StateOperation>>>,
    commit_attempts: AtomicUsize,
    fail_next_commit: AtomicBool,
    fail_reads: AtomicBool,
    stall_reads: AtomicBool,
    stall_commits: AtomicBool,
    latency: Mutex<Option<Duration>>,
    release: Notify,
}

impl RecordingStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate stored TTLs against `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: InMemoryStateStore::with_clock(clock),
            ..Self::default()
        }
    }

    /// The wrapped store, for seeding and inspecting data directly.
    pub fn inner(&self) -> &InMemoryStateStore {
        &self.inner
    }

    /// Seed a value without going through a batch.
    pub fn seed(&self, actor: &ActorRef, name: &str, data: serde_json::Value) {
        self.inner
            .insert(actor, name, StoredState::new(StateValue::from_json(data), None))
            .unwrap();
    }

    /// Names read so far, in call order.
    pub fn reads(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    /// Batches the store accepted, in commit order.
    pub fn batches(&self) -> Vec<Vec<StateOperation>> {
        self.batches.lock().unwrap().clone()
    }

    pub fn last_batch(&self) -> Option<Vec<StateOperation>> {
        self.batches.lock().unwrap().last().cloned()
    }

    /// Wire body of the last accepted batch.
    pub fn last_body(&self) -> Option<String> {
        self.last_batch().map(|batch| encode_batch(&batch).unwrap())
    }

    /// Commit calls received, accepted or not.
    pub fn commit_attempts(&self) -> usize {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Reject the next commit with `CommitFailed`.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Make every read fail with `ReadFailed` until turned off.
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Hold reads until [`release`](Self::release) is called.
    pub fn stall_reads(&self, stall: bool) {
        self.stall_reads.store(stall, Ordering::SeqCst);
    }

    /// Hold commits until [`release`](Self::release) is called.
    pub fn stall_commits(&self, stall: bool) {
        self.stall_commits.store(stall, Ordering::SeqCst);
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Wake every stalled call.
    pub fn release(&self) {
        self.stall_reads(false);
        self.stall_commits(false);
        self.release.notify_waiters();
    }

    async fn hold(&self, stall: &AtomicBool) {
        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        loop {
            let released = self.release.notified();
            if !stall.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }
    }
}

#[async_trait]
impl StateStore for RecordingStateStore {
    async fn read_state(&self, actor: &ActorRef, name: &str) -> StateResult<Option<StoredState>> {
        self.reads.lock().unwrap().push(name.to_string());
        self.hold(&self.stall_reads).await;
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RemoteError::ReadFailed {
                name: name.to_string(),
                reason: "injected read failure".to_string(),
            }
            .into());
        }
        self.inner.read_state(actor, name).await
    }

    async fn commit_batch(
        &self,
        actor: &ActorRef,
        operations: &[StateOperation],
    ) -> StateResult<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        self.hold(&self.stall_commits).await;
        if self.fail_next_commit.swap(false, Ordering::SeqCst) {
            return Err(RemoteError::CommitFailed {
                reason: "injected commit failure".to_string(),
            }
            .into());
        }
        self.inner.commit_batch(actor, operations).await?;
        self.batches.lock().unwrap().push(operations.to_vec());
        Ok(())
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for actorstate types.

    use super::*;
    use proptest::prelude::*;

    /// Generate a state name.
    pub fn arb_state_name() -> impl Strategy<Value = String> {
        "[a-zA-Z][a-zA-Z0-9_.-]{0,15}"
    }

    /// Generate an actor reference.
    pub fn arb_actor_ref() -> impl Strategy<Value = ActorRef> {
        ("[A-Z][a-zA-Z]{2,10}", "[a-z0-9-]{1,12}").prop_map(|(t, id)| ActorRef::new(t, id))
    }

    /// Generate a JSON payload, nested up to a few levels.
    pub fn arb_json() -> impl Strategy<Value = serde_json::Value> {
        let leaf = prop_oneof![
            Just(serde_json::Value::Null),
            any::<bool>().prop_map(serde_json::Value::from),
            any::<i64>().prop_map(serde_json::Value::from),
            "[ -~]{0,24}".prop_map(serde_json::Value::from),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                    .prop_map(|m| serde_json::Value::Object(m.into_iter().collect())),
            ]
        })
    }

    /// Generate a state value read back from a store.
    pub fn arb_state_value() -> impl Strategy<Value = StateValue> {
        arb_json().prop_map(StateValue::from_json)
    }

    /// Generate an optional TTL of whole seconds.
    pub fn arb_ttl() -> impl Strategy<Value = Option<Duration>> {
        prop::option::of((1u64..3600).prop_map(Duration::from_secs))
    }

    /// Generate a change kind.
    pub fn arb_change_kind() -> impl Strategy<Value = ChangeKind> {
        prop_oneof![
            Just(ChangeKind::Add),
            Just(ChangeKind::Update),
            Just(ChangeKind::Remove),
        ]
    }

    /// Generate a sequence of staged operations without expiry.
    pub fn arb_operations(max: usize) -> impl Strategy<Value = Vec<PendingOperation>> {
        prop::collection::vec((arb_state_name(), arb_change_kind(), arb_state_value()), 0..max)
            .prop_map(|ops| {
                ops.into_iter()
                    .map(|(name, kind, value)| match kind {
                        ChangeKind::Add => PendingOperation::add(name, value, None),
                        ChangeKind::Update => PendingOperation::update(name, value, None),
                        ChangeKind::Remove => PendingOperation::remove(name),
                    })
                    .collect()
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common testing scenarios.

    use super::*;

    /// The activation most tests run against.
    pub fn actor() -> ActorRef {
        ActorRef::new("TestActor", "actor-1")
    }

    /// A manual clock starting at the current wall time.
    pub fn manual_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::starting_now())
    }

    /// A recording store sharing `clock`.
    pub fn recording_store(clock: &Arc<ManualClock>) -> Arc<RecordingStateStore> {
        Arc::new(RecordingStateStore::with_clock(clock.clone()))
    }

    /// A manager for [`actor`] over `store`, evaluating TTLs against `clock`.
    pub fn manager(
        store: &Arc<RecordingStateStore>,
        clock: &Arc<ManualClock>,
    ) -> ActorStateManager<RecordingStateStore> {
        ActorStateManager::new(actor(), store.clone()).with_clock(clock.clone())
    }

    /// Same as [`manager`], with an explicit configuration.
    pub fn manager_with_config(
        store: &Arc<RecordingStateStore>,
        clock: &Arc<ManualClock>,
        config: StateConfig,
    ) -> ActorStateManager<RecordingStateStore> {
        ActorStateManager::with_config(actor(), store.clone(), config)
            .unwrap()
            .with_clock(clock.clone())
    }

    /// Clock, store and manager wired together.
    pub fn harness() -> (
        Arc<ManualClock>,
        Arc<RecordingStateStore>,
        ActorStateManager<RecordingStateStore>,
    ) {
        let clock = manual_clock();
        let store = recording_store(&clock);
        let mngr = manager(&store, &clock);
        (clock, store, mngr)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for the error outcomes a turn branches on.

    use super::*;

    #[track_caller]
    pub fn assert_conflict<T: std::fmt::Debug>(result: &StateResult<T>, name: &str) {
        match result {
            Err(StateError::Conflict { name: n }) => assert_eq!(n, name),
            other => panic!("Expected Conflict for {}, got: {:?}", name, other),
        }
    }

    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &StateResult<T>, name: &str) {
        match result {
            Err(StateError::NotFound { name: n }) => assert_eq!(n, name),
            other => panic!("Expected NotFound for {}, got: {:?}", name, other),
        }
    }

    #[track_caller]
    pub fn assert_cancelled<T: std::fmt::Debug>(result: &StateResult<T>) {
        match result {
            Err(StateError::Cancelled) => {}
            other => panic!("Expected Cancelled, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_remote_error<T: std::fmt::Debug>(result: &StateResult<T>) {
        match result {
            Err(StateError::Remote(_)) => {}
            other => panic!("Expected Remote error, got: {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_recording_store_records_and_fails() {
        let store = RecordingStateStore::new();
        let actor = fixtures::actor();
        store.seed(&actor, "k", serde_json::json!(1));

        let read = store.read_state(&actor, "k").await.unwrap();
        assert_eq!(read.map(|s| s.value.data), Some(serde_json::json!(1)));
        assert_eq!(store.reads(), vec!["k".to_string()]);

        store.fail_next_commit();
        let batch = vec![StateOperation::delete("k")];
        assertions::assert_remote_error(&store.commit_batch(&actor, &batch).await);
        assert!(store.batches().is_empty());

        store.commit_batch(&actor, &batch).await.unwrap();
        assert_eq!(store.commit_attempts(), 2);
        assert_eq!(
            store.last_body().unwrap(),
            r#"[{"operation":"delete","request":{"key":"k"}}]"#
        );
    }

    proptest! {
        #[test]
        fn test_generated_names_are_valid(name in generators::arb_state_name()) {
            prop_assert!(!name.is_empty());
        }
    }
}
