//! Wall-clock source for TTL evaluation.
//!
//! Expiration is judged against the clock at the moment of a query; nothing
//! sweeps expired entries in the background. Tests swap in [`ManualClock`]
//! to step time forward without sleeping.

use std::fmt;
use std::sync::Mutex;
use std::time::Duration;

use crate::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

/// Clock backed by `chrono::Utc::now`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        chrono::Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Start at the current system time.
    pub fn starting_now() -> Self {
        Self::new(chrono::Utc::now())
    }

    pub fn set(&self, to: Timestamp) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = expiry_after(*now, by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Convert a std duration, saturating instead of overflowing.
pub fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}

/// Absolute expiry for a TTL starting at `now`.
pub fn expiry_after(now: Timestamp, ttl: Duration) -> Timestamp {
    now.checked_add_signed(to_chrono(ttl))
        .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC)
}

/// An entry is live while its expiry is strictly in the future.
pub fn is_expired(expires_at: Option<Timestamp>, now: Timestamp) -> bool {
    matches!(expires_at, Some(at) if at <= now)
}

/// Whole seconds left until `expires_at`, truncated and floored at zero.
pub fn remaining_ttl_seconds(expires_at: Timestamp, now: Timestamp) -> u64 {
    let seconds = expires_at.signed_duration_since(now).num_seconds();
    u64::try_from(seconds).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch_plus(secs: i64) -> Timestamp {
        chrono::Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(epoch_plus(0));
        clock.advance(Duration::from_millis(1500));
        assert_eq!(
            clock.now(),
            epoch_plus(1) + chrono::Duration::milliseconds(500)
        );
        clock.set(epoch_plus(10));
        assert_eq!(clock.now(), epoch_plus(10));
    }

    #[test]
    fn test_is_expired_boundary() {
        let now = epoch_plus(5);
        assert!(!is_expired(None, now));
        assert!(!is_expired(Some(epoch_plus(6)), now));
        assert!(is_expired(Some(now), now));
        assert!(is_expired(Some(epoch_plus(4)), now));
    }

    #[test]
    fn test_remaining_ttl_truncates() {
        let now = epoch_plus(0);
        let at = epoch_plus(2) + chrono::Duration::milliseconds(999);
        assert_eq!(remaining_ttl_seconds(at, now), 2);
        assert_eq!(remaining_ttl_seconds(epoch_plus(-3), now), 0);
    }

    #[test]
    fn test_expiry_after_saturates() {
        let now = epoch_plus(0);
        assert_eq!(expiry_after(now, Duration::from_secs(1)), epoch_plus(1));
        assert_eq!(
            expiry_after(now, Duration::MAX),
            chrono::DateTime::<chrono::Utc>::MAX_UTC
        );
    }
}
