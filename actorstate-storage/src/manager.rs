//! Per-activation state manager.
//!
//! Business logic talks to [`ActorStateManager`] for one activation. Every
//! mutation is buffered in the change overlay and mirrored into the
//! read-through cache; [`ActorStateManager::save_state`] flushes the overlay
//! as one ordered batch. The surrounding runtime runs at most one turn at a
//! time per activation, so the manager is plain `&mut self` with no locking.
//!
//! Effective presence of a name is resolved overlay first, then cache, then
//! store (through the cache). A value whose expiry has passed is absent at
//! every layer.

use std::sync::Arc;
use std::time::Duration;

use actorstate_core::{
    expiry_after, ActorRef, Clock, PendingOperation, StateConfig, StateError, StateResult,
    StateValue, SystemClock, Timestamp,
};
use serde::{de::DeserializeOwned, Serialize};
use tokio_util::sync::CancellationToken;

use crate::cache::{CacheStats, ReadThroughCache};
use crate::commit::{commit, CommitReport};
use crate::store::StateStore;
use crate::tracker::StateChangeTracker;

/// State cache and transactional commit layer for one actor activation.
#[derive(Debug)]
pub struct ActorStateManager<S: StateStore> {
    actor: ActorRef,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    config: StateConfig,
    tracker: StateChangeTracker,
    cache: ReadThroughCache,
}

impl<S: StateStore> ActorStateManager<S> {
    /// Create a manager with the default configuration and the system clock.
    pub fn new(actor: ActorRef, store: Arc<S>) -> Self {
        Self::build(actor, store, StateConfig::default(), Arc::new(SystemClock))
    }

    /// Create a manager with an explicit, validated configuration.
    pub fn with_config(actor: ActorRef, store: Arc<S>, config: StateConfig) -> StateResult<Self> {
        config.validate()?;
        Ok(Self::build(actor, store, config, Arc::new(SystemClock)))
    }

    /// Evaluate TTLs against `clock`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn build(actor: ActorRef, store: Arc<S>, config: StateConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: ReadThroughCache::new(config.cache_reads),
            actor,
            store,
            clock,
            config,
            tracker: StateChangeTracker::new(),
        }
    }

    pub fn actor(&self) -> &ActorRef {
        &self.actor
    }

    pub fn config(&self) -> &StateConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Pending operations in the order they will be committed.
    pub fn pending_operations(&self) -> impl Iterator<Item = &PendingOperation> {
        self.tracker.iter()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.tracker.is_empty()
    }

    // ========================================================================
    // ADD
    // ========================================================================

    /// Stage a new state. Fails with `Conflict` if the name is effectively
    /// present; nothing is staged or mirrored in that case.
    pub async fn add_state<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
        ttl: Option<Duration>,
        cancel: &CancellationToken,
    ) -> StateResult<()> {
        let value = StateValue::encode(value)?;
        if self.resolve_presence(name, cancel).await? {
            tracing::debug!(actor = %self.actor, state_name = name, "add rejected, state exists");
            return Err(StateError::conflict(name));
        }
        let expires_at = self.expiry_for(ttl);
        self.stage(PendingOperation::add(name, value, expires_at));
        Ok(())
    }

    /// Like [`add_state`](Self::add_state), returning `false` instead of `Conflict`.
    pub async fn try_add_state<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
        ttl: Option<Duration>,
        cancel: &CancellationToken,
    ) -> StateResult<bool> {
        match self.add_state(name, value, ttl, cancel).await {
            Ok(()) => Ok(true),
            Err(StateError::Conflict { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    // ========================================================================
    // SET
    // ========================================================================

    /// Unconditional upsert. Without a `ttl` any previous expiry is cleared.
    pub fn set_state<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> StateResult<()> {
        let value = StateValue::encode(value)?;
        let expires_at = self.expiry_for(ttl);
        self.stage(PendingOperation::update(name, value, expires_at));
        Ok(())
    }

    // ========================================================================
    // GET
    // ========================================================================

    /// Read a state, failing with `NotFound` if it is effectively absent.
    pub async fn get_state<T: DeserializeOwned>(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<T> {
        self.try_get_state(name, cancel)
            .await?
            .ok_or_else(|| StateError::not_found(name))
    }

    /// Read a state, returning `None` if it is effectively absent.
    pub async fn try_get_state<T: DeserializeOwned>(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<Option<T>> {
        match self.resolve_value(name, cancel).await? {
            Some(value) => Ok(Some(value.decode()?)),
            None => Ok(None),
        }
    }

    /// Effective presence of `name`.
    pub async fn contains_state(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<bool> {
        self.resolve_presence(name, cancel).await
    }

    // ========================================================================
    // REMOVE
    // ========================================================================

    /// Stage a removal. Fails with `NotFound` if the name is effectively absent.
    pub async fn remove_state(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<()> {
        if !self.resolve_presence(name, cancel).await? {
            return Err(StateError::not_found(name));
        }
        self.stage(PendingOperation::remove(name));
        Ok(())
    }

    /// Like [`remove_state`](Self::remove_state), returning `false` instead of `NotFound`.
    pub async fn try_remove_state(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<bool> {
        match self.remove_state(name, cancel).await {
            Ok(()) => Ok(true),
            Err(StateError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    // ========================================================================
    // COMPOSITES
    // ========================================================================

    /// Return the current value, or stage `value` and return it if absent.
    pub async fn get_or_add_state<T>(
        &mut self,
        name: &str,
        value: T,
        ttl: Option<Duration>,
        cancel: &CancellationToken,
    ) -> StateResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        if let Some(current) = self.try_get_state(name, cancel).await? {
            return Ok(current);
        }
        let encoded = StateValue::encode(&value)?;
        let expires_at = self.expiry_for(ttl);
        self.stage(PendingOperation::add(name, encoded, expires_at));
        Ok(value)
    }

    /// Stage `add_value` if absent, otherwise `update(name, current)`.
    /// Returns the value staged.
    pub async fn add_or_update_state<T, F>(
        &mut self,
        name: &str,
        add_value: T,
        update: F,
        ttl: Option<Duration>,
        cancel: &CancellationToken,
    ) -> StateResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&str, T) -> T,
    {
        let (next, existed) = match self.try_get_state::<T>(name, cancel).await? {
            Some(current) => (update(name, current), true),
            None => (add_value, false),
        };
        let encoded = StateValue::encode(&next)?;
        let expires_at = self.expiry_for(ttl);
        let operation = if existed {
            PendingOperation::update(name, encoded, expires_at)
        } else {
            PendingOperation::add(name, encoded, expires_at)
        };
        self.stage(operation);
        Ok(next)
    }

    /// Names with a staged Add or Update in this turn.
    pub fn pending_state_names(&self) -> Vec<String> {
        self.tracker.staged_names()
    }

    // ========================================================================
    // TURN BOUNDARY
    // ========================================================================

    /// Commit the turn's pending operations as one ordered batch.
    ///
    /// On success the overlay is cleared. On failure or cancellation it is
    /// left intact; nothing is retried here.
    pub async fn save_state(&mut self, cancel: &CancellationToken) -> StateResult<CommitReport> {
        commit(
            self.store.as_ref(),
            &self.actor,
            &mut self.tracker,
            self.clock.as_ref(),
            self.config.max_batch_operations,
            cancel,
        )
        .await
    }

    /// Discard the overlay and the cache, abandoning the current turn.
    pub fn clear_cache(&mut self) {
        tracing::debug!(
            actor = %self.actor,
            discarded = self.tracker.len(),
            "discarding pending state and cache"
        );
        self.tracker.clear();
        self.cache.clear();
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn expiry_for(&self, ttl: Option<Duration>) -> Option<Timestamp> {
        ttl.map(|ttl| expiry_after(self.clock.now(), ttl))
    }

    /// Record `operation` in the overlay and keep the cache in step with it.
    fn stage(&mut self, operation: PendingOperation) {
        tracing::debug!(
            actor = %self.actor,
            state_name = %operation.name,
            kind = ?operation.kind(),
            has_ttl = operation.expires_at().is_some(),
            "staged state change"
        );
        match operation.staged() {
            Some(staged) => {
                self.cache
                    .put(&operation.name, staged.value.clone(), staged.expires_at)
            }
            None => self.cache.invalidate(&operation.name),
        }
        self.tracker.stage(operation);
    }

    async fn resolve_presence(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<bool> {
        if let Some(present) = self.tracker.presence(name, self.clock.now()) {
            return Ok(present);
        }
        Ok(self.load(name, cancel).await?.is_some())
    }

    async fn resolve_value(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<Option<StateValue>> {
        if let Some(op) = self.tracker.get(name) {
            let live = self.tracker.presence(name, self.clock.now()) == Some(true);
            return Ok(op.value().filter(|_| live).cloned());
        }
        self.load(name, cancel).await
    }

    async fn load(
        &mut self,
        name: &str,
        cancel: &CancellationToken,
    ) -> StateResult<Option<StateValue>> {
        self.cache
            .load(
                self.store.as_ref(),
                &self.actor,
                name,
                self.clock.as_ref(),
                cancel,
            )
            .await
    }
}
