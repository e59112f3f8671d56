//! Request coalescing: at most one in-flight fetch per resource.
//!
//! When several callers ask for the same [`ResourceKey`] at once (a view
//! appearing while a background refresh fires, or two tabs pulling the same
//! list) only one fetch actually runs. Every other caller attaches to the
//! in-flight attempt and receives the same terminal outcome.
//!
//! # Implementation
//!
//! An in-flight registry maps each key to a broadcast sender. The first
//! caller to register becomes the leader, runs the work, and completes the
//! entry; completion removes the registry entry *before* broadcasting, so a
//! request arriving after completion starts a new attempt rather than
//! attaching to a finished one. Every waiter receives exactly one terminal
//! outcome.

use crate::resource::ResourceKey;
use crate::service::RawOutcome;
use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;

/// Capacity of each per-key broadcast channel. One terminal outcome is ever
/// sent per channel; capacity above 1 is slack, not a requirement.
const CHANNEL_CAPACITY: usize = 4;

/// Result of registering interest in a key.
pub enum Registration {
    /// First caller in: run the work and call
    /// [`RequestCoalescer::complete`]. The receiver yields the outcome the
    /// leader's own work produces, so leaders and followers wait the same
    /// way.
    Leader(broadcast::Receiver<RawOutcome>),
    /// An attempt is already in flight: wait on the receiver.
    Follower(broadcast::Receiver<RawOutcome>),
}

impl Registration {
    /// True if this registration made the caller the leader.
    pub fn is_leader(&self) -> bool {
        matches!(self, Registration::Leader(_))
    }

    /// The receiver for the terminal outcome.
    pub fn into_receiver(self) -> broadcast::Receiver<RawOutcome> {
        match self {
            Registration::Leader(rx) | Registration::Follower(rx) => rx,
        }
    }
}

/// Effectiveness counters for diagnostics.
#[derive(Debug, Default, Clone)]
pub struct CoalescerStats {
    /// Registrations received in total.
    pub total_requests: u64,
    /// Registrations that attached to existing work.
    pub coalesced_requests: u64,
    /// Registrations that started new work.
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Fraction of requests that were absorbed by in-flight work.
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Tracks in-flight fetches and fans their outcomes out to waiters.
pub struct RequestCoalescer {
    in_flight: Mutex<HashMap<ResourceKey, broadcast::Sender<RawOutcome>>>,
    stats: Mutex<CoalescerStats>,
}

impl RequestCoalescer {
    /// Creates an empty coalescer.
    pub fn new() -> Self {
        Self {
            in_flight: Mutex::new(HashMap::new()),
            stats: Mutex::new(CoalescerStats::default()),
        }
    }

    /// Registers interest in `key`.
    ///
    /// Exactly one concurrent caller per key becomes the leader; the rest
    /// become followers on the same channel. The leader must eventually
    /// call [`complete`](Self::complete) or every waiter hangs.
    pub async fn register(&self, key: &ResourceKey) -> Registration {
        let mut in_flight = self.in_flight.lock().await;
        let mut stats = self.stats.lock().await;
        stats.total_requests += 1;

        if let Some(tx) = in_flight.get(key) {
            stats.coalesced_requests += 1;
            debug!(key = %key, "attaching to in-flight fetch");
            Registration::Follower(tx.subscribe())
        } else {
            let (tx, rx) = broadcast::channel(CHANNEL_CAPACITY);
            in_flight.insert(key.clone(), tx);
            stats.new_requests += 1;
            Registration::Leader(rx)
        }
    }

    /// Completes the in-flight attempt for `key`, broadcasting `outcome`
    /// to every waiter and removing the registry entry.
    pub async fn complete(&self, key: &ResourceKey, outcome: RawOutcome) {
        let tx = {
            let mut in_flight = self.in_flight.lock().await;
            in_flight.remove(key)
        };

        if let Some(tx) = tx {
            let waiters = tx.receiver_count();
            // Send errors only mean every waiter already went away.
            let _ = tx.send(outcome);
            if waiters > 1 {
                debug!(key = %key, waiters, "broadcast outcome to coalesced waiters");
            }
        }
    }

    /// Number of keys currently in flight.
    pub async fn in_flight_count(&self) -> usize {
        self.in_flight.lock().await.len()
    }

    /// Snapshot of the effectiveness counters.
    pub async fn stats(&self) -> CoalescerStats {
        self.stats.lock().await.clone()
    }
}

impl Default for RequestCoalescer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::FetchError;
    use bytes::Bytes;
    use std::sync::Arc;

    fn key() -> ResourceKey {
        ResourceKey::market_list(1, "usd")
    }

    fn fresh(body: &'static [u8]) -> RawOutcome {
        RawOutcome::Fresh(Bytes::from_static(body))
    }

    #[tokio::test]
    async fn first_registration_leads() {
        let coalescer = RequestCoalescer::new();
        assert!(coalescer.register(&key()).await.is_leader());
    }

    #[tokio::test]
    async fn second_registration_follows() {
        let coalescer = RequestCoalescer::new();
        let _leader = coalescer.register(&key()).await;
        assert!(!coalescer.register(&key()).await.is_leader());
    }

    #[tokio::test]
    async fn different_keys_do_not_coalesce() {
        let coalescer = RequestCoalescer::new();
        let _a = coalescer.register(&ResourceKey::market_list(1, "usd")).await;
        let b = coalescer.register(&ResourceKey::market_list(2, "usd")).await;
        assert!(b.is_leader());
    }

    #[tokio::test]
    async fn followers_receive_the_leaders_outcome() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let _leader = coalescer.register(&key()).await;

        let mut receivers = Vec::new();
        for _ in 0..3 {
            receivers.push(coalescer.register(&key()).await.into_receiver());
        }

        coalescer.complete(&key(), fresh(b"[1]")).await;

        for mut rx in receivers {
            let outcome = rx.recv().await.unwrap();
            assert_eq!(outcome.payload(), Some(&Bytes::from_static(b"[1]")));
        }
    }

    #[tokio::test]
    async fn leader_receives_its_own_outcome() {
        let coalescer = RequestCoalescer::new();
        let leader = coalescer.register(&key()).await;
        let mut rx = leader.into_receiver();

        coalescer.complete(&key(), fresh(b"[2]")).await;
        let outcome = rx.recv().await.unwrap();
        assert_eq!(outcome.payload(), Some(&Bytes::from_static(b"[2]")));
    }

    #[tokio::test]
    async fn completion_clears_in_flight() {
        let coalescer = RequestCoalescer::new();
        let _leader = coalescer.register(&key()).await;
        assert_eq!(coalescer.in_flight_count().await, 1);

        coalescer.complete(&key(), fresh(b"[]")).await;
        assert_eq!(coalescer.in_flight_count().await, 0);

        // A later registration starts fresh work.
        assert!(coalescer.register(&key()).await.is_leader());
    }

    #[tokio::test]
    async fn failures_broadcast_like_successes() {
        let coalescer = RequestCoalescer::new();
        let _leader = coalescer.register(&key()).await;
        let mut rx = coalescer.register(&key()).await.into_receiver();

        coalescer
            .complete(&key(), RawOutcome::Failed(FetchError::RateLimited))
            .await;

        let outcome = rx.recv().await.unwrap();
        assert!(matches!(
            outcome,
            RawOutcome::Failed(FetchError::RateLimited)
        ));
    }

    #[tokio::test]
    async fn concurrent_registrations_elect_one_leader() {
        let coalescer = Arc::new(RequestCoalescer::new());

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let coalescer = Arc::clone(&coalescer);
                tokio::spawn(async move { coalescer.register(&key()).await.is_leader() })
            })
            .collect();

        let mut leaders = 0;
        for handle in handles {
            if handle.await.unwrap() {
                leaders += 1;
            }
        }
        assert_eq!(leaders, 1);
    }

    #[tokio::test]
    async fn stats_track_coalescing() {
        let coalescer = RequestCoalescer::new();
        let _leader = coalescer.register(&key()).await;
        let _f1 = coalescer.register(&key()).await;
        let _f2 = coalescer.register(&key()).await;
        let _f3 = coalescer.register(&key()).await;

        let stats = coalescer.stats().await;
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.new_requests, 1);
        assert_eq!(stats.coalesced_requests, 3);
        assert!((stats.coalescing_ratio() - 0.75).abs() < 1e-9);
    }
}
