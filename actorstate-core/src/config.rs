//! Configuration types

use crate::*;
use serde::{Deserialize, Serialize};

/// Per-activation state manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateConfig {
    /// Answer presence checks and reads from the read-through cache.
    /// When disabled every lookup not answered by the overlay hits the store.
    pub cache_reads: bool,
    /// Upper bound on operations in one transactional commit. `None` = unbounded.
    pub max_batch_operations: Option<usize>,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            cache_reads: true,
            max_batch_operations: None,
        }
    }
}

impl StateConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable the read-through cache.
    pub fn with_cache_reads(mut self, enabled: bool) -> Self {
        self.cache_reads = enabled;
        self
    }

    /// Cap the number of operations per commit.
    pub fn with_max_batch_operations(mut self, limit: usize) -> Self {
        self.max_batch_operations = Some(limit);
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `ACTORSTATE_CACHE_READS`: `true`/`1` or `false`/`0` (default: true)
    /// - `ACTORSTATE_MAX_BATCH_OPERATIONS`: positive integer (default: unbounded)
    ///
    /// Unparseable values, including a batch limit of `0`, fall back to the
    /// default, so the result always passes [`validate`](Self::validate).
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            cache_reads: std::env::var("ACTORSTATE_CACHE_READS")
                .ok()
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.cache_reads),
            max_batch_operations: std::env::var("ACTORSTATE_MAX_BATCH_OPERATIONS")
                .ok()
                .and_then(|s| s.trim().parse::<usize>().ok())
                .filter(|&limit| limit > 0)
                .or(defaults.max_batch_operations),
        }
    }

    /// Validate the configuration.
    /// Returns Ok(()) if valid, Err(StateError::Config) if invalid.
    pub fn validate(&self) -> StateResult<()> {
        if self.max_batch_operations == Some(0) {
            return Err(StateError::Config(ConfigError::InvalidValue {
                field: "max_batch_operations".to_string(),
                value: "0".to_string(),
                reason: "max_batch_operations must be greater than 0".to_string(),
            }));
        }

        Ok(())
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Serializes tests that touch process environment variables.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const CACHE_READS: &str = "ACTORSTATE_CACHE_READS";
    const MAX_BATCH: &str = "ACTORSTATE_MAX_BATCH_OPERATIONS";

    fn with_env(cache_reads: Option<&str>, max_batch: Option<&str>) -> StateConfig {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        for (key, value) in [(CACHE_READS, cache_reads), (MAX_BATCH, max_batch)] {
            match value {
                Some(value) => std::env::set_var(key, value),
                None => std::env::remove_var(key),
            }
        }
        let config = StateConfig::from_env();
        std::env::remove_var(CACHE_READS);
        std::env::remove_var(MAX_BATCH);
        config
    }

    #[test]
    fn test_from_env_unset_uses_defaults() {
        assert_eq!(with_env(None, None), StateConfig::default());
    }

    #[test]
    fn test_from_env_reads_valid_values() {
        let config = with_env(Some("false"), Some(" 32 "));
        assert!(!config.cache_reads);
        assert_eq!(config.max_batch_operations, Some(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_env_garbage_falls_back() {
        let config = with_env(Some("sometimes"), Some("lots"));
        assert_eq!(config, StateConfig::default());
    }

    #[test]
    fn test_from_env_zero_limit_falls_back() {
        let config = with_env(Some("1"), Some("0"));
        assert!(config.cache_reads);
        assert_eq!(config.max_batch_operations, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_valid() {
        let config = StateConfig::default();
        assert!(config.cache_reads);
        assert_eq!(config.max_batch_operations, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = StateConfig::new()
            .with_cache_reads(false)
            .with_max_batch_operations(64);
        assert!(!config.cache_reads);
        assert_eq!(config.max_batch_operations, Some(64));
    }

    #[test]
    fn test_zero_batch_limit_rejected() {
        let result = StateConfig::new().with_max_batch_operations(0).validate();
        if let Err(StateError::Config(ConfigError::InvalidValue { field, .. })) = result {
            assert_eq!(field, "max_batch_operations");
        } else {
            panic!("Expected ConfigError::InvalidValue");
        }
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_config_serde_round_trip() {
        let config = StateConfig::new().with_max_batch_operations(8);
        let json = serde_json::to_string(&config).unwrap();
        let back: StateConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
