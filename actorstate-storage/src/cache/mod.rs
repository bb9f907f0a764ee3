//! TTL-aware read-through cache.
//!
//! One cache per activation. Values fetched from the store are kept together
//! with their absolute expiry, so repeated reads in a turn do not go back to
//! the network and expired values read as absent without asking again.
//!
//! Nothing is evicted in the background: an entry is only judged stale when
//! it is looked up, against the clock at that moment.

pub mod entry;
pub mod read_through;

pub use entry::{CacheEntry, CacheLookup, CacheStats};
pub use read_through::ReadThroughCache;
