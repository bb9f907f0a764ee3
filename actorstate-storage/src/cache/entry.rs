//! Cache records and bookkeeping.

use actorstate_core::{is_expired, StateValue, Timestamp};

/// A value held by the read-through cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub value: StateValue,
    /// Absolute expiry; `None` means the value never expires.
    pub expires_at: Option<Timestamp>,
    /// Monotonic load marker. Freshness bookkeeping only, never consulted
    /// for expiry.
    pub loaded_at: u64,
}

impl CacheEntry {
    pub fn is_live(&self, now: Timestamp) -> bool {
        !is_expired(self.expires_at, now)
    }
}

/// Outcome of consulting the cache without touching the store.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// A live entry.
    Hit(StateValue),
    /// An entry existed but its expiry has passed; it has been dropped.
    Expired,
    /// Nothing cached for the name.
    Miss,
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from memory.
    pub hits: u64,
    /// Lookups that found nothing cached.
    pub misses: u64,
    /// Lookups that found an expired entry.
    pub expired: u64,
    /// Point reads issued to the store.
    pub remote_reads: u64,
    /// Number of entries currently in cache.
    pub entries: usize,
}

impl CacheStats {
    /// Fraction of lookups served from memory.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.expired;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            hits: 3,
            misses: 1,
            expired: 0,
            remote_reads: 1,
            entries: 2,
        };
        assert!((stats.hit_rate() - 0.75).abs() < f64::EPSILON);
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }
}
