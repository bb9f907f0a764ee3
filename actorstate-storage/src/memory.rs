//! In-memory state store.
//!
//! Behaves like the remote store as far as this crate can observe: one
//! namespace per activation, TTLs turned into absolute expiries on write,
//! expired entries read back as absent, and batches validated up front and
//! applied in order under a single write lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use ::async_trait::async_trait;
use actorstate_core::{
    expiry_after, ActorRef, Clock, RemoteError, StateOperation, StateResult, StateValue,
    StoredState, SystemClock,
};

use crate::store::StateStore;

type Namespace = HashMap<String, StoredState>;

/// Thread-safe in-memory [`StateStore`].
#[derive(Debug, Clone)]
pub struct InMemoryStateStore {
    namespaces: Arc<RwLock<HashMap<ActorRef, Namespace>>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Evaluate TTLs against `clock` instead of the system time.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Seed a value directly, bypassing the batch path.
    pub fn insert(
        &self,
        actor: &ActorRef,
        name: impl Into<String>,
        state: StoredState,
    ) -> StateResult<()> {
        let mut namespaces = self.namespaces.write().map_err(|_| RemoteError::LockPoisoned)?;
        namespaces
            .entry(actor.clone())
            .or_default()
            .insert(name.into(), state);
        Ok(())
    }

    /// Live (unexpired) entry count for one activation.
    pub fn len(&self, actor: &ActorRef) -> StateResult<usize> {
        let now = self.clock.now();
        let namespaces = self.namespaces.read().map_err(|_| RemoteError::LockPoisoned)?;
        Ok(namespaces
            .get(actor)
            .map(|ns| ns.values().filter(|s| !s.is_expired(now)).count())
            .unwrap_or(0))
    }

    pub fn is_empty(&self, actor: &ActorRef) -> StateResult<bool> {
        Ok(self.len(actor)? == 0)
    }

    /// Clear all stored data.
    pub fn clear(&self) -> StateResult<()> {
        self.namespaces
            .write()
            .map_err(|_| RemoteError::LockPoisoned)?
            .clear();
        Ok(())
    }

    fn validate(operations: &[StateOperation]) -> Result<(), RemoteError> {
        for (position, operation) in operations.iter().enumerate() {
            if operation.key().is_empty() {
                return Err(RemoteError::CommitFailed {
                    reason: format!("operation {} has an empty key", position),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn read_state(&self, actor: &ActorRef, name: &str) -> StateResult<Option<StoredState>> {
        let now = self.clock.now();
        let namespaces = self.namespaces.read().map_err(|_| RemoteError::LockPoisoned)?;
        Ok(namespaces
            .get(actor)
            .and_then(|ns| ns.get(name))
            .filter(|state| !state.is_expired(now))
            .cloned())
    }

    async fn commit_batch(
        &self,
        actor: &ActorRef,
        operations: &[StateOperation],
    ) -> StateResult<()> {
        Self::validate(operations)?;

        let now = self.clock.now();
        let mut namespaces = self.namespaces.write().map_err(|_| RemoteError::LockPoisoned)?;
        let namespace = namespaces.entry(actor.clone()).or_default();

        for operation in operations {
            match operation {
                StateOperation::Upsert(request) => {
                    let expires_at = request.metadata.as_ref().map(|m| {
                        expiry_after(now, std::time::Duration::from_secs(m.ttl_in_seconds))
                    });
                    namespace.insert(
                        request.key.clone(),
                        StoredState::new(StateValue::from_json(request.value.clone()), expires_at),
                    );
                }
                StateOperation::Delete(request) => {
                    namespace.remove(&request.key);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actorstate_core::{ManualClock, StateError};
    use std::time::Duration;

    fn actor() -> ActorRef {
        ActorRef::new("Counter", "1")
    }

    fn json(v: serde_json::Value) -> StateValue {
        StateValue::from_json(v)
    }

    #[tokio::test]
    async fn test_commit_applies_in_order() {
        let store = InMemoryStateStore::new();
        let ops = vec![
            StateOperation::upsert("a", &json(serde_json::json!(1)), None),
            StateOperation::upsert("a", &json(serde_json::json!(2)), None),
            StateOperation::upsert("b", &json(serde_json::json!(3)), None),
            StateOperation::delete("b"),
        ];
        store.commit_batch(&actor(), &ops).await.unwrap();

        let a = store.read_state(&actor(), "a").await.unwrap().unwrap();
        assert_eq!(a.value.data, serde_json::json!(2));
        assert!(a.value.is_untyped());
        assert!(store.read_state(&actor(), "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ttl_expires_entry() {
        let clock = Arc::new(ManualClock::starting_now());
        let store = InMemoryStateStore::with_clock(clock.clone());
        let ops = vec![StateOperation::upsert("k", &json(serde_json::json!("v")), Some(1))];
        store.commit_batch(&actor(), &ops).await.unwrap();

        let read = store.read_state(&actor(), "k").await.unwrap().unwrap();
        assert_eq!(read.expires_at, Some(expiry_after(clock.now(), Duration::from_secs(1))));

        clock.advance(Duration::from_millis(1500));
        assert!(store.read_state(&actor(), "k").await.unwrap().is_none());
        assert_eq!(store.len(&actor()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_batch_applies_nothing() {
        let store = InMemoryStateStore::new();
        let ops = vec![
            StateOperation::upsert("ok", &json(serde_json::json!(1)), None),
            StateOperation::delete(""),
        ];
        let err = store.commit_batch(&actor(), &ops).await.unwrap_err();
        assert!(matches!(
            err,
            StateError::Remote(RemoteError::CommitFailed { .. })
        ));
        assert!(store.read_state(&actor(), "ok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = InMemoryStateStore::new();
        let other = ActorRef::new("Counter", "2");
        store
            .insert(&actor(), "k", StoredState::new(json(serde_json::json!(1)), None))
            .unwrap();

        assert!(store.read_state(&other, "k").await.unwrap().is_none());
        assert_eq!(store.len(&actor()).unwrap(), 1);
        assert!(store.is_empty(&other).unwrap());
    }

    #[tokio::test]
    async fn test_clear_drops_every_namespace() {
        let store = InMemoryStateStore::new();
        let other = ActorRef::new("Counter", "2");
        for actor in [actor(), other.clone()] {
            store
                .insert(&actor, "k", StoredState::new(json(serde_json::json!(1)), None))
                .unwrap();
        }

        store.clear().unwrap();
        assert!(store.is_empty(&actor()).unwrap());
        assert!(store.read_state(&other, "k").await.unwrap().is_none());
    }
}
