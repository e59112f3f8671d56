//! Background refresh daemon.
//!
//! Periodically re-resolves a registered set of resources so entries the
//! presentation layer cares about stay warm. Refreshes are not forced:
//! still-fresh entries short-circuit in the cache and the dispatch ledger
//! keeps the daemon from hammering the upstream when intervals are short.
//!
//! # Example
//!
//! ```ignore
//! use coinfeed::service::RefreshDaemon;
//! use tokio_util::sync::CancellationToken;
//!
//! let daemon = RefreshDaemon::new(service, Duration::from_secs(60));
//! daemon.track(ResourceKey::market_list(1, "usd"));
//! let shutdown = CancellationToken::new();
//! tokio::spawn(daemon.run(shutdown.clone()));
//! // ...
//! shutdown.cancel();
//! ```

use crate::resource::ResourceKey;
use crate::service::{DataService, RawOutcome, ResolveOptions};
use crate::transport::Transport;
use futures::future::join_all;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default interval between refresh sweeps.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 60;

/// Background daemon that keeps tracked resources warm.
pub struct RefreshDaemon<T> {
    service: DataService<T>,
    tracked: Mutex<Vec<ResourceKey>>,
    interval: Duration,
}

impl<T: Transport + 'static> RefreshDaemon<T> {
    /// Creates a daemon sweeping at the given interval.
    pub fn new(service: DataService<T>, interval: Duration) -> Self {
        Self {
            service,
            tracked: Mutex::new(Vec::new()),
            interval,
        }
    }

    /// Creates a daemon with the default sweep interval.
    pub fn with_default_interval(service: DataService<T>) -> Self {
        Self::new(service, Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS))
    }

    /// Adds a key to the refresh set. Duplicates are ignored.
    pub fn track(&self, key: ResourceKey) {
        let mut tracked = self.tracked.lock().unwrap();
        if !tracked.contains(&key) {
            debug!(key = %key, "tracking resource for refresh");
            tracked.push(key);
        }
    }

    /// Removes a key from the refresh set.
    pub fn untrack(&self, key: &ResourceKey) {
        self.tracked.lock().unwrap().retain(|k| k != key);
    }

    /// Number of resources currently tracked.
    pub fn tracked_count(&self) -> usize {
        self.tracked.lock().unwrap().len()
    }

    /// Runs the sweep loop until shutdown is signalled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            "refresh daemon starting"
        );

        let mut interval = tokio::time::interval(self.interval);
        // Skip the first immediate tick
        interval.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("refresh daemon shutting down");
                    break;
                }

                _ = interval.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Re-resolves every tracked key once, concurrently. Outcomes reach
    /// the presentation layer through the service's subscription channels.
    async fn sweep(&self) {
        let keys: Vec<ResourceKey> = self.tracked.lock().unwrap().clone();
        if keys.is_empty() {
            return;
        }
        debug!(tracked = keys.len(), "refresh sweep starting");

        let resolutions = keys.iter().map(|key| async move {
            let outcome = self
                .service
                .resolve_raw(key, ResolveOptions::default())
                .await;
            (key, outcome)
        });

        for (key, outcome) in join_all(resolutions).await {
            match outcome {
                RawOutcome::Fresh(_) => {
                    debug!(key = %key, "refresh sweep: fresh");
                }
                RawOutcome::Stale(_, reason) => {
                    debug!(key = %key, reason = ?reason, "refresh sweep: stale");
                }
                RawOutcome::Failed(error) => {
                    warn!(key = %key, error = %error, "refresh sweep: failed");
                }
            }
        }
    }
}
