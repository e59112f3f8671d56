//! Per-class dispatch rate limiting.
//!
//! The upstream API has a shared quota; this limiter keeps a ledger of the
//! last dispatch time per resource class and refuses a new dispatch before
//! the class's minimum interval has elapsed. Check-and-record is atomic per
//! class: each class has its own mutex slot, so two concurrent callers can
//! never both observe "allowed" inside one window, and unrelated classes
//! never contend on a shared lock.

use crate::clock::Clock;
use crate::resource::{ResourceClass, CLASS_COUNT};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tracing::debug;

/// Dispatch ledger with per-class minimum intervals.
pub struct RateLimiter {
    /// Last dispatch time per class, indexed by [`ResourceClass::slot`].
    ledger: [Mutex<Option<SystemTime>>; CLASS_COUNT],
    /// Minimum interval per class, same indexing.
    intervals: [Duration; CLASS_COUNT],
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter enforcing `intervals[class.slot()]` per class.
    pub fn new(intervals: [Duration; CLASS_COUNT], clock: Arc<dyn Clock>) -> Self {
        Self {
            ledger: Default::default(),
            intervals,
            clock,
        }
    }

    /// Creates a limiter from each class's canonical policy.
    pub fn with_default_policies(clock: Arc<dyn Clock>) -> Self {
        let mut intervals = [Duration::ZERO; CLASS_COUNT];
        for class in ResourceClass::ALL {
            intervals[class.slot()] = class.policy().min_dispatch_interval;
        }
        Self::new(intervals, clock)
    }

    /// Atomically checks whether a dispatch is allowed and, if so, records
    /// it. Returns `false` when the class's minimum interval has not yet
    /// elapsed since the last recorded dispatch.
    pub fn try_dispatch(&self, class: ResourceClass) -> bool {
        let now = self.clock.now();
        let mut last = self.ledger[class.slot()].lock().unwrap();

        let allowed = match *last {
            None => true,
            Some(at) => match now.duration_since(at) {
                Ok(elapsed) => elapsed >= self.intervals[class.slot()],
                // Ledger entry from the future (penalty or clock skew):
                // the interval has not elapsed.
                Err(_) => false,
            },
        };

        if allowed {
            *last = Some(now);
        } else {
            debug!(class = %class, "dispatch throttled by ledger");
        }
        allowed
    }

    /// Records a dispatch unconditionally.
    ///
    /// Used by forced refreshes: the bypass still updates the ledger so
    /// subsequent automatic calls stay throttled.
    pub fn force_dispatch(&self, class: ResourceClass) {
        let now = self.clock.now();
        let mut last = self.ledger[class.slot()].lock().unwrap();
        *last = Some(now);
    }

    /// Re-stamps the ledger after an upstream HTTP 429.
    ///
    /// Treats the rejection as if a dispatch just occurred, so sibling
    /// requests for the same class back off class-wide instead of piling
    /// onto an already-exhausted quota.
    pub fn penalize(&self, class: ResourceClass) {
        let now = self.clock.now();
        let mut last = self.ledger[class.slot()].lock().unwrap();
        *last = Some(now);
        debug!(class = %class, "ledger penalized after upstream rate limit");
    }

    /// Last recorded dispatch time for a class, if any.
    pub fn last_dispatch(&self, class: ResourceClass) -> Option<SystemTime> {
        *self.ledger[class.slot()].lock().unwrap()
    }
}
