//! Error types for actor state operations

use thiserror::Error;

/// Failures reported by the remote state store.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Read of state {name} failed: {reason}")]
    ReadFailed { name: String, reason: String },

    #[error("Transactional commit failed: {reason}")]
    CommitFailed { reason: String },

    #[error("State store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("State store lock poisoned")]
    LockPoisoned,
}

/// Payload encoding errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("Failed to encode value of type {value_type}: {reason}")]
    Encode { value_type: String, reason: String },

    #[error("Failed to decode value of type {value_type} as {requested}: {reason}")]
    Decode {
        value_type: String,
        requested: String,
        reason: String,
    },

    #[error("Malformed state batch: {reason}")]
    MalformedBatch { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for actor state operations.
///
/// `Conflict`, `NotFound`, `Remote` and `Cancelled` are the outcomes a turn
/// has to branch on; the remaining variants describe misuse or bad payloads.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Actor state with name {name} already exists")]
    Conflict { name: String },

    #[error("Actor state with name {name} was not found")]
    NotFound { name: String },

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("State batch of {operations} operations exceeds the limit of {limit}")]
    BatchTooLarge { operations: usize, limit: usize },
}

impl StateError {
    pub fn conflict(name: impl Into<String>) -> Self {
        Self::Conflict { name: name.into() }
    }

    pub fn not_found(name: impl Into<String>) -> Self {
        Self::NotFound { name: name.into() }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

/// Result type alias for actor state operations.
pub type StateResult<T> = Result<T, StateError>;

// =============================================================================
// TESTS
// =============================================================================
