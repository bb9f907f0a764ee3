//! Read-through cache over a [`StateStore`].
//!
//! Reads are answered from memory while the cached entry is live; a miss or
//! an expired entry falls through to one point read of the store. Writes
//! staged by the overlay are mirrored in with [`ReadThroughCache::put`] and
//! removals dropped with [`ReadThroughCache::invalidate`], so the cache
//! already matches the store once the turn's batch commits.

use std::collections::HashMap;

use actorstate_core::{ActorRef, Clock, StateResult, StateValue, Timestamp};
use tokio_util::sync::CancellationToken;

use super::entry::{CacheEntry, CacheLookup, CacheStats};
use crate::store::{cancellable, StateStore};

/// Per-activation read-through cache.
#[derive(Debug)]
pub struct ReadThroughCache {
    entries: HashMap<String, CacheEntry>,
    /// When disabled every load goes to the store and nothing is retained.
    enabled: bool,
    next_load: u64,
    stats: CacheStats,
}

impl Default for ReadThroughCache {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ReadThroughCache {
    pub fn new(enabled: bool) -> Self {
        Self {
            entries: HashMap::new(),
            enabled,
            next_load: 0,
            stats: CacheStats::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// What memory says about `name` at `now`, without touching entries or stats.
    pub fn classify(&self, name: &str, now: Timestamp) -> CacheLookup {
        match self.entries.get(name) {
            None => CacheLookup::Miss,
            Some(entry) if entry.is_live(now) => CacheLookup::Hit(entry.value.clone()),
            Some(_) => CacheLookup::Expired,
        }
    }

    /// Consult memory only. Expired entries are dropped on the way out.
    pub fn lookup(&mut self, name: &str, now: Timestamp) -> CacheLookup {
        let outcome = self.classify(name, now);
        self.record(name, &outcome);
        outcome
    }

    fn record(&mut self, name: &str, outcome: &CacheLookup) {
        match outcome {
            CacheLookup::Hit(_) => self.stats.hits += 1,
            CacheLookup::Miss => self.stats.misses += 1,
            CacheLookup::Expired => {
                self.stats.expired += 1;
                self.entries.remove(name);
                tracing::debug!(state_name = name, "dropped expired cache entry");
            }
        }
    }

    /// Return the live value for `name`, reading through to the store on a
    /// miss or after expiry.
    ///
    /// A value the store reports as already expired is treated as absent.
    /// If the read fails or is cancelled the cache is left exactly as it was.
    #[tracing::instrument(skip_all, fields(actor = %actor, state_name = name))]
    pub async fn load<S>(
        &mut self,
        store: &S,
        actor: &ActorRef,
        name: &str,
        clock: &dyn Clock,
        cancel: &CancellationToken,
    ) -> StateResult<Option<StateValue>>
    where
        S: StateStore + ?Sized,
    {
        let cached = if self.enabled {
            self.classify(name, clock.now())
        } else {
            CacheLookup::Miss
        };
        if let CacheLookup::Hit(value) = cached {
            self.stats.hits += 1;
            return Ok(Some(value));
        }

        let fetched = cancellable(cancel, store.read_state(actor, name)).await?;
        if self.enabled {
            self.record(name, &cached);
        }
        self.stats.remote_reads += 1;

        let now = clock.now();
        match fetched {
            Some(stored) if !stored.is_expired(now) => {
                tracing::debug!(
                    has_ttl = stored.expires_at.is_some(),
                    "loaded state from store"
                );
                self.put(name, stored.value.clone(), stored.expires_at);
                Ok(Some(stored.value))
            }
            _ => {
                tracing::debug!("state absent in store");
                self.entries.remove(name);
                Ok(None)
            }
        }
    }

    /// Mirror a value accepted by the overlay.
    pub fn put(&mut self, name: &str, value: StateValue, expires_at: Option<Timestamp>) {
        if !self.enabled {
            return;
        }
        self.next_load += 1;
        self.entries.insert(
            name.to_string(),
            CacheEntry {
                value,
                expires_at,
                loaded_at: self.next_load,
            },
        );
    }

    /// Drop any entry for `name`.
    pub fn invalidate(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Inspect an entry without expiry evaluation or stats.
    pub fn peek(&self, name: &str) -> Option<&CacheEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.len(),
            ..self.stats.clone()
        }
    }
}
