//! Injectable time source.
//!
//! Freshness windows, dispatch ledgers and persisted timestamps all compare
//! against "now". Injecting the clock keeps every one of those comparisons
//! deterministic in tests: a `ManualClock` can be advanced by exact amounts
//! instead of sleeping through real TTL windows.

use std::sync::Mutex;
use std::time::{Duration, SystemTime};

/// Source of the current wall-clock time.
///
/// Production code uses [`SystemClock`]; tests use [`ManualClock`] and
/// advance it explicitly.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// Clock backed by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually-advanced clock for deterministic tests.
///
/// Starts at a fixed instant and only moves when [`advance`](Self::advance)
/// or [`set`](Self::set) is called.
///
/// # Example
///
/// ```
/// use std::time::{Duration, SystemTime};
/// use coinfeed::clock::{Clock, ManualClock};
///
/// let clock = ManualClock::new(SystemTime::UNIX_EPOCH);
/// clock.advance(Duration::from_secs(300));
/// assert_eq!(
///     clock.now().duration_since(SystemTime::UNIX_EPOCH).unwrap(),
///     Duration::from_secs(300)
/// );
/// ```
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<SystemTime>,
}

impl ManualClock {
    /// Creates a manual clock starting at the given instant.
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Creates a manual clock starting at the Unix epoch.
    pub fn at_epoch() -> Self {
        Self::new(SystemTime::UNIX_EPOCH)
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, at: SystemTime) {
        let mut now = self.now.lock().unwrap();
        *now = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_tracks_real_time() {
        let clock = SystemClock;
        let before = SystemTime::now();
        let observed = clock.now();
        let after = SystemTime::now();

        assert!(observed >= before);
        assert!(observed <= after);
    }

    #[test]
    fn manual_clock_starts_where_told() {
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::from_secs(10));
        clock.advance(Duration::from_secs(5));

        assert_eq!(
            clock.now(),
            SystemTime::UNIX_EPOCH + Duration::from_secs(15)
        );
    }

    #[test]
    fn manual_clock_set_overrides() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::from_secs(100));

        let target = SystemTime::UNIX_EPOCH + Duration::from_secs(7);
        clock.set(target);
        assert_eq!(clock.now(), target);
    }
}
