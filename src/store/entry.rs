//! Cache entry representation.

use bytes::Bytes;
use std::time::{Duration, SystemTime};

/// One cached resource payload with its write timestamp.
///
/// Entries hold the validated response bytes, never a decoded value; the
/// caller's decoder runs at read time. An entry is immutable once written:
/// a refresh replaces it wholesale, and staleness is always a read-time
/// computation, never a reason for removal.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Validated upstream payload.
    pub payload: Bytes,
    /// When the payload was stored.
    pub stored_at: SystemTime,
}

impl CacheEntry {
    /// Creates an entry stamped at `stored_at`.
    pub fn new(payload: Bytes, stored_at: SystemTime) -> Self {
        Self { payload, stored_at }
    }

    /// Age of the entry as seen from `now`.
    ///
    /// A clock that moved backwards yields zero rather than an error; an
    /// entry from the "future" is simply very fresh.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.stored_at).unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is within the freshness window `ttl` at `now`.
    pub fn is_fresh(&self, now: SystemTime, ttl: Duration) -> bool {
        self.age(now) < ttl
    }
}
