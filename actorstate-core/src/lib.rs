//! actorstate core - state types
//!
//! Pure data structures shared by the cache, the change overlay and the
//! commit protocol. No I/O lives here.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

pub mod batch;
pub mod clock;
pub mod config;
pub mod error;

pub use batch::{
    decode_batch, encode_batch, DeleteRequest, RequestMetadata, StateOperation, UpsertRequest,
};
pub use clock::{
    expiry_after, is_expired, remaining_ttl_seconds, Clock, ManualClock, SystemClock,
};
pub use config::StateConfig;
pub use error::{CodecError, ConfigError, RemoteError, StateError, StateResult};

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// The activation whose state namespace a key belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorRef {
    pub actor_type: String,
    pub actor_id: String,
}

impl ActorRef {
    pub fn new(actor_type: impl Into<String>, actor_id: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            actor_id: actor_id.into(),
        }
    }
}

impl fmt::Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.actor_type, self.actor_id)
    }
}

// ============================================================================
// VALUES
// ============================================================================

/// An opaque state payload together with the type it was written as.
///
/// The store only keeps the JSON; values read back from it are tagged
/// [`StateValue::UNTYPED`] and take their type from the caller at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateValue {
    pub value_type: String,
    pub data: serde_json::Value,
}

impl StateValue {
    /// Tag for payloads whose writing type is unknown.
    pub const UNTYPED: &'static str = "json";

    /// Serialize `value`, tagging it with its Rust type name.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, CodecError> {
        let value_type = std::any::type_name::<T>();
        let data = serde_json::to_value(value).map_err(|e| CodecError::Encode {
            value_type: value_type.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            value_type: value_type.to_string(),
            data,
        })
    }

    /// Wrap raw JSON read from the store.
    pub fn from_json(data: serde_json::Value) -> Self {
        Self {
            value_type: Self::UNTYPED.to_string(),
            data,
        }
    }

    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, CodecError> {
        T::deserialize(&self.data).map_err(|e| CodecError::Decode {
            value_type: self.value_type.clone(),
            requested: std::any::type_name::<T>().to_string(),
            reason: e.to_string(),
        })
    }

    pub fn is_untyped(&self) -> bool {
        self.value_type == Self::UNTYPED
    }
}

/// A value as returned by a point read of the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredState {
    pub value: StateValue,
    /// Absolute expiry reported by the store; `None` means no TTL.
    pub expires_at: Option<Timestamp>,
}

impl StoredState {
    pub fn new(value: StateValue, expires_at: Option<Timestamp>) -> Self {
        Self { value, expires_at }
    }

    pub fn is_expired(&self, now: Timestamp) -> bool {
        is_expired(self.expires_at, now)
    }
}

// ============================================================================
// PENDING CHANGES
// ============================================================================

/// Kind of a buffered mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Add,
    Update,
    Remove,
}

/// Value and expiry staged by an Add or Update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StagedValue {
    pub value: StateValue,
    pub expires_at: Option<Timestamp>,
}

/// The buffered mutation for one state name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateChange {
    Add(StagedValue),
    Update(StagedValue),
    Remove,
}

/// One entry of the change overlay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
    pub name: String,
    pub change: StateChange,
}

impl PendingOperation {
    pub fn add(name: impl Into<String>, value: StateValue, expires_at: Option<Timestamp>) -> Self {
        Self {
            name: name.into(),
            change: StateChange::Add(StagedValue { value, expires_at }),
        }
    }

    pub fn update(
        name: impl Into<String>,
        value: StateValue,
        expires_at: Option<Timestamp>,
    ) -> Self {
        Self {
            name: name.into(),
            change: StateChange::Update(StagedValue { value, expires_at }),
        }
    }

    pub fn remove(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            change: StateChange::Remove,
        }
    }

    pub fn kind(&self) -> ChangeKind {
        match self.change {
            StateChange::Add(_) => ChangeKind::Add,
            StateChange::Update(_) => ChangeKind::Update,
            StateChange::Remove => ChangeKind::Remove,
        }
    }

    /// The staged value, absent for removals.
    pub fn staged(&self) -> Option<&StagedValue> {
        match &self.change {
            StateChange::Add(staged) | StateChange::Update(staged) => Some(staged),
            StateChange::Remove => None,
        }
    }

    pub fn value(&self) -> Option<&StateValue> {
        self.staged().map(|s| &s.value)
    }

    pub fn expires_at(&self) -> Option<Timestamp> {
        self.staged().and_then(|s| s.expires_at)
    }

    pub fn is_remove(&self) -> bool {
        matches!(self.change, StateChange::Remove)
    }

    /// Wire operation for this change, with TTL measured from `now`.
    pub fn to_state_operation(&self, now: Timestamp) -> StateOperation {
        match &self.change {
            StateChange::Add(staged) | StateChange::Update(staged) => StateOperation::upsert(
                self.name.clone(),
                &staged.value,
                staged.expires_at.map(|at| remaining_ttl_seconds(at, now)),
            ),
            StateChange::Remove => StateOperation::delete(self.name.clone()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
    }

    fn t(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[test]
    fn test_state_value_tags_type() {
        let value = StateValue::encode(&42u64).unwrap();
        assert_eq!(value.value_type, "u64");
        assert!(!value.is_untyped());
        assert_eq!(value.decode::<u64>().unwrap(), 42);
    }

    #[test]
    fn test_untyped_value_decodes_as_requested() {
        let value = StateValue::from_json(serde_json::json!({"name": "ada", "visits": 3}));
        assert!(value.is_untyped());
        let profile: Profile = value.decode().unwrap();
        assert_eq!(
            profile,
            Profile {
                name: "ada".to_string(),
                visits: 3
            }
        );
    }

    #[test]
    fn test_decode_mismatch_is_codec_error() {
        let value = StateValue::encode(&"text").unwrap();
        let err = value.decode::<u32>().unwrap_err();
        assert!(matches!(err, CodecError::Decode { .. }));
    }

    #[test]
    fn test_pending_operation_accessors() {
        let value = StateValue::encode(&1i32).unwrap();
        let add = PendingOperation::add("a", value.clone(), Some(t(10)));
        assert_eq!(add.kind(), ChangeKind::Add);
        assert_eq!(add.value(), Some(&value));
        assert_eq!(add.expires_at(), Some(t(10)));

        let remove = PendingOperation::remove("a");
        assert_eq!(remove.kind(), ChangeKind::Remove);
        assert!(remove.is_remove());
        assert!(remove.value().is_none());
        assert!(remove.expires_at().is_none());
    }

    #[test]
    fn test_to_state_operation_computes_ttl_at_commit_time() {
        let value = StateValue::encode(&"v").unwrap();
        let op = PendingOperation::update("k", value, Some(t(30)));
        assert_eq!(op.to_state_operation(t(0)).ttl_seconds(), Some(30));
        assert_eq!(op.to_state_operation(t(29)).ttl_seconds(), Some(1));
        assert_eq!(op.to_state_operation(t(45)).ttl_seconds(), Some(0));
    }

    #[test]
    fn test_remove_becomes_delete() {
        let op = PendingOperation::remove("k").to_state_operation(t(0));
        assert!(op.is_delete());
        assert_eq!(op.key(), "k");
    }

    #[test]
    fn test_stored_state_expiry() {
        let stored = StoredState::new(StateValue::from_json(serde_json::json!(1)), Some(t(5)));
        assert!(!stored.is_expired(t(4)));
        assert!(stored.is_expired(t(5)));
        let forever = StoredState::new(StateValue::from_json(serde_json::json!(1)), None);
        assert!(!forever.is_expired(t(1_000_000)));
    }

    #[test]
    fn test_actor_ref_display() {
        assert_eq!(ActorRef::new("Counter", "7").to_string(), "Counter/7");
    }
}
