//! actorstate storage - per-activation state cache and transactional commit
//!
//! Sits between actor business logic and a remote, TTL-capable key-value
//! store:
//!
//! - [`ReadThroughCache`] keeps values already fetched, with their expiry.
//! - [`StateChangeTracker`] buffers the turn's Add/Update/Remove operations.
//! - [`commit`] flushes the buffer as one ordered batch.
//! - [`ActorStateManager`] ties them together for one activation.
//!
//! The store itself is reached through the [`StateStore`] trait.

pub mod cache;
pub mod commit;
pub mod manager;
pub mod memory;
pub mod store;
pub mod tracker;

pub use cache::{CacheEntry, CacheLookup, CacheStats, ReadThroughCache};
pub use commit::{build_batch, commit, CommitReport};
pub use manager::ActorStateManager;
pub use memory::InMemoryStateStore;
pub use store::StateStore;
pub use tracker::StateChangeTracker;

// Re-export core types for convenience
pub use actorstate_core::{
    ActorRef, ChangeKind, Clock, ManualClock, PendingOperation, StateConfig, StateError,
    StateOperation, StateResult, StateValue, StoredState, SystemClock,
};
pub use tokio_util::sync::CancellationToken;

// ============================================================================
// TESTS
// ============================================================================


// ============================================================================
// PROPERTY-BASED TESTS
// ============================================================================
