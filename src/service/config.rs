//! Service configuration.

use crate::resource::{ClassPolicy, ResourceClass, CLASS_COUNT};
use std::time::Duration;

/// Configuration for a [`DataService`](super::DataService).
///
/// Defaults track the public CoinGecko-compatible API surface; tests
/// override the base URL and shrink per-class policies to millisecond
/// scales.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// API root without a trailing slash.
    pub base_url: String,
    /// Fixed timeout applied to every transport call, independent of
    /// retry backoff.
    pub request_timeout: Duration,
    /// Per-class policy overrides; `None` slots use the canonical table.
    overrides: [Option<ClassPolicy>; CLASS_COUNT],
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.coingecko.com/api/v3".to_string(),
            request_timeout: Duration::from_secs(15),
            overrides: [None; CLASS_COUNT],
        }
    }
}

impl ServiceConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API root.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the per-request transport timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Overrides the policy for one class.
    pub fn with_policy(mut self, class: ResourceClass, policy: ClassPolicy) -> Self {
        self.overrides[class.slot()] = Some(policy);
        self
    }

    /// Overrides every class with the same policy. Test convenience.
    pub fn with_uniform_policy(mut self, policy: ClassPolicy) -> Self {
        self.overrides = [Some(policy); CLASS_COUNT];
        self
    }

    /// Effective policy for a class: the override if set, else the
    /// canonical table row.
    pub fn policy(&self, class: ResourceClass) -> ClassPolicy {
        self.overrides[class.slot()].unwrap_or_else(|| class.policy())
    }

    /// Effective dispatch interval per class, for seeding the rate limiter.
    pub fn dispatch_intervals(&self) -> [Duration; CLASS_COUNT] {
        let mut intervals = [Duration::ZERO; CLASS_COUNT];
        for class in ResourceClass::ALL {
            intervals[class.slot()] = self.policy(class).min_dispatch_interval;
        }
        intervals
    }
}
