//! Data service: the single entry point for resolving market data.
//!
//! `DataService::resolve` decides, per call, whether to serve from memory,
//! promote from durable storage, fetch over the network, retry with
//! backoff, or fall back to stale data. Every call terminates in exactly
//! one of `Fresh`, `Stale` or `Failed`.
//!
//! # Resolution algorithm
//!
//! ```text
//! resolve(key)
//!   ├─ cached entry fresh? ──────────────► Fresh (no network, no ledger)
//!   ├─ coalescer: attempt in flight? ────► attach, await shared outcome
//!   └─ leader: spawn attempt task
//!        ├─ ledger refuses dispatch ─────► Stale(Throttled) | Failed
//!        └─ attempt loop (1..=max_attempts)
//!             ├─ fetch ok + decodes ─────► put cache ► Fresh
//!             ├─ retryable error ────────► sleep backoff, next attempt
//!             └─ give up ────────────────► Stale(reason) | Failed
//! ```
//!
//! The attempt task is spawned, not awaited inline: a caller that loses
//! interest (a dismissed view) abandons its receiver, while the fetch runs
//! to completion and populates the cache for the next caller.

mod config;
mod error;
mod outcome;
mod refresh;

pub use config::ServiceConfig;
pub use error::FetchError;
pub use outcome::{Outcome, RawOutcome, StaleReason};
pub use refresh::RefreshDaemon;

use crate::clock::Clock;
use crate::coalesce::{CoalescerStats, Registration, RequestCoalescer};
use crate::limiter::RateLimiter;
use crate::resource::{models, ResourceClass, ResourceKey};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::store::{BlobStore, CacheEntry, EntryStore, StoreStats};
use crate::transport::{Transport, TransportError, TransportRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of each subscription channel. Outcomes are snapshots, not an
/// event log; a lagging subscriber loses the oldest ones and keeps going.
const SUBSCRIPTION_CAPACITY: usize = 16;

/// Per-call options for [`DataService::resolve`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Skip the freshness short-circuit and the ledger's allow check.
    /// The bypassed dispatch is still recorded, so automatic calls that
    /// follow remain throttled.
    pub force_refresh: bool,
}

impl ResolveOptions {
    /// Options for a user-initiated refresh (pull-to-refresh).
    pub fn force() -> Self {
        Self {
            force_refresh: true,
        }
    }
}

struct ServiceInner<T> {
    transport: T,
    store: EntryStore,
    limiter: RateLimiter,
    coalescer: RequestCoalescer,
    config: ServiceConfig,
    clock: Arc<dyn Clock>,
    subscribers: Mutex<HashMap<ResourceKey, broadcast::Sender<RawOutcome>>>,
}

/// The data-access service. Cheap to clone; clones share all state.
pub struct DataService<T> {
    inner: Arc<ServiceInner<T>>,
}

impl<T> Clone for DataService<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport + 'static> DataService<T> {
    /// Creates a service over the given transport, durable tier and clock.
    pub fn new(
        transport: T,
        blob: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        let limiter = RateLimiter::new(config.dispatch_intervals(), clock.clone());
        let store = EntryStore::new(blob, clock.clone());
        Self {
            inner: Arc::new(ServiceInner {
                transport,
                store,
                limiter,
                coalescer: RequestCoalescer::new(),
                config,
                clock,
                subscribers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolves a resource into a typed outcome.
    ///
    /// `decode` turns validated payload bytes into the caller's view of the
    /// resource; [`crate::resource::models`] provides decoders for the
    /// catalog shapes.
    pub async fn resolve<V, D>(
        &self,
        key: &ResourceKey,
        decode: D,
        options: ResolveOptions,
    ) -> Outcome<V>
    where
        D: Fn(&[u8]) -> Result<V, serde_json::Error>,
    {
        self.resolve_raw(key, options).await.decode(decode)
    }

    /// Resolves a resource at the bytes level.
    ///
    /// This is the full algorithm; [`resolve`](Self::resolve) is a typed
    /// veneer over it and the refresh daemon drives it directly.
    pub async fn resolve_raw(&self, key: &ResourceKey, options: ResolveOptions) -> RawOutcome {
        let inner = &self.inner;
        let policy = inner.config.policy(key.class());

        // Fresh cache hit: no network, no ledger, no coalescer.
        if !options.force_refresh {
            if let Some(entry) = inner.store.get(key) {
                if entry.is_fresh(inner.clock.now(), policy.ttl) {
                    debug!(key = %key, age_secs = entry.age(inner.clock.now()).as_secs(), "serving fresh cache hit");
                    return RawOutcome::Fresh(entry.payload);
                }
            }
        }

        let mut rx = match inner.coalescer.register(key).await {
            Registration::Follower(rx) => rx,
            Registration::Leader(rx) => {
                let task_inner = Arc::clone(inner);
                let task_key = key.clone();
                let force = options.force_refresh;
                // Detached so an abandoned caller never cancels the fetch;
                // the outcome still lands in the cache and the broadcast.
                tokio::spawn(async move {
                    let outcome = task_inner.attempt_fetch(&task_key, force).await;
                    task_inner.publish(&task_key, &outcome);
                    task_inner.coalescer.complete(&task_key, outcome).await;
                });
                rx
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // Only reachable if the attempt task itself died; serve what
            // the cache has rather than surfacing a broken channel.
            Err(_) => {
                warn!(key = %key, "in-flight fetch dropped without an outcome");
                let error = FetchError::Transport(TransportError::ConnectionFailed(
                    "in-flight fetch dropped".to_string(),
                ));
                inner.stale_or_failed(key, StaleReason::Fetch(error.clone()), error)
            }
        }
    }

    /// Subscribes to terminal outcomes for a key.
    ///
    /// Every completed fetch for the key, caller-initiated or from the
    /// refresh daemon, is delivered to all subscribers. This is the only
    /// surface the presentation layer observes besides `resolve` itself.
    pub fn subscribe(&self, key: &ResourceKey) -> broadcast::Receiver<RawOutcome> {
        let mut subscribers = self.inner.subscribers.lock().unwrap();
        subscribers
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(SUBSCRIPTION_CAPACITY).0)
            .subscribe()
    }

    /// Number of keys with a live subscription channel.
    pub fn subscription_count(&self) -> usize {
        self.inner.subscribers.lock().unwrap().len()
    }

    /// Drops the cached entry for a key from both tiers.
    pub fn invalidate(&self, key: &ResourceKey) {
        info!(key = %key, "invalidating cached entry");
        self.inner.store.clear(key);
    }

    /// Drops every cached entry of a class from both tiers.
    pub fn invalidate_class(&self, class: ResourceClass) {
        info!(class = %class, "invalidating cached class");
        self.inner.store.clear_class(class);
    }

    /// Snapshot of coalescer effectiveness counters.
    pub async fn coalescer_stats(&self) -> CoalescerStats {
        self.inner.coalescer.stats().await
    }

    /// Snapshot of cache tier counters.
    pub fn store_stats(&self) -> StoreStats {
        self.inner.store.stats()
    }
}

impl<T: Transport + 'static> ServiceInner<T> {
    /// Runs the attempt loop for one resource. Exactly one of these runs
    /// per key at a time (the coalescer guarantees it).
    async fn attempt_fetch(&self, key: &ResourceKey, force: bool) -> RawOutcome {
        let class = key.class();
        let policy = self.config.policy(class);

        if force {
            // Bypass the allow check but still record the dispatch.
            self.limiter.force_dispatch(class);
        } else {
            // Re-check freshness now that we hold leadership: a fetch that
            // completed while we queued may have repopulated the entry.
            if let Some(entry) = self.store.get(key) {
                if entry.is_fresh(self.clock.now(), policy.ttl) {
                    return RawOutcome::Fresh(entry.payload);
                }
            }
            if !self.limiter.try_dispatch(class) {
                debug!(key = %key, "dispatch refused by ledger");
                return self.stale_or_failed(key, StaleReason::Throttled, FetchError::Throttled);
            }
        }

        let retry = RetryPolicy::from_class(&policy);
        let request = TransportRequest::new(
            key.request_url(&self.config.base_url),
            self.config.request_timeout,
        );

        let mut attempts: u32 = 0;
        let final_error = loop {
            attempts += 1;
            let error = match self.transport.fetch(&request).await {
                Ok(body) => match models::validate(class, &body) {
                    Ok(()) => {
                        let entry: CacheEntry = self.store.put(key, body);
                        info!(key = %key, attempts, bytes = entry.payload.len(), "fetch succeeded");
                        return RawOutcome::Fresh(entry.payload);
                    }
                    Err(e) => FetchError::Decode(e.to_string()),
                },
                Err(transport_error) => {
                    let error = FetchError::from_transport(transport_error);
                    if matches!(error, FetchError::RateLimited) {
                        // Class-wide backoff: siblings see a just-stamped
                        // ledger and stop dispatching too.
                        self.limiter.penalize(class);
                    }
                    error
                }
            };

            match retry.next_delay(attempts, &error) {
                RetryDecision::Delay(delay) => {
                    debug!(
                        key = %key,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "attempt failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::GiveUp => {
                    warn!(key = %key, attempts, error = %error, "giving up on fetch");
                    break error;
                }
            }
        };

        self.stale_or_failed(key, StaleReason::Fetch(final_error.clone()), final_error)
    }

    /// Stale-on-error fallback: any cached entry, of any age, beats an
    /// error; `Failed` only when both tiers are empty.
    fn stale_or_failed(
        &self,
        key: &ResourceKey,
        reason: StaleReason,
        error: FetchError,
    ) -> RawOutcome {
        match self.store.get(key) {
            Some(entry) => {
                info!(
                    key = %key,
                    age_secs = entry.age(self.clock.now()).as_secs(),
                    "serving stale fallback"
                );
                RawOutcome::Stale(entry.payload, reason)
            }
            None => RawOutcome::Failed(error),
        }
    }

    fn publish(&self, key: &ResourceKey, outcome: &RawOutcome) {
        let mut subscribers = self.subscribers.lock().unwrap();
        // Channels whose receivers have all dropped are dead weight; sweep
        // them here so the map tracks live subscriptions only.
        subscribers.retain(|_, tx| tx.receiver_count() > 0);
        if let Some(tx) = subscribers.get(key) {
            let _ = tx.send(outcome.clone());
        }
    }
}
