//! Resource classes and their static fetch policy.
//!
//! Every logical resource the service can fetch belongs to exactly one
//! class. The class carries the policy knobs that govern its lifecycle:
//! how long a cached value counts as fresh, how often the upstream endpoint
//! may be hit, and how failures are retried.
//!
//! The policy table below is the single authoritative set of values. The
//! application this layer was extracted from carried conflicting per-screen
//! windows (30s, 300s, 600s across revisions); those are collapsed into one
//! declared table here.

use std::fmt;
use std::time::Duration;

/// Kind of upstream resource, with static per-class policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceClass {
    /// Paged list of coins ordered by market cap.
    MarketList,
    /// Global market aggregates (total cap, dominance percentages).
    GlobalMetrics,
    /// Sector / category listing.
    SectorList,
    /// Market data for a user-chosen set of coins.
    Watchlist,
    /// Historical price series for one coin.
    PriceHistory,
    /// Coin image metadata for a set of coins.
    CoinImageSet,
}

/// Number of resource classes; sized for per-class slot arrays.
pub const CLASS_COUNT: usize = 6;

/// Static fetch policy for a resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassPolicy {
    /// Freshness window: a cached entry younger than this is served without
    /// any network activity.
    pub ttl: Duration,
    /// Minimum interval between dispatches for this class.
    pub min_dispatch_interval: Duration,
    /// Maximum transport attempts per resolve before giving up.
    pub max_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub backoff_base: Duration,
}

impl ResourceClass {
    /// All classes, in slot order.
    pub const ALL: [ResourceClass; CLASS_COUNT] = [
        ResourceClass::MarketList,
        ResourceClass::GlobalMetrics,
        ResourceClass::SectorList,
        ResourceClass::Watchlist,
        ResourceClass::PriceHistory,
        ResourceClass::CoinImageSet,
    ];

    /// Stable slot index for per-class arrays (dispatch ledger slots).
    pub fn slot(self) -> usize {
        match self {
            ResourceClass::MarketList => 0,
            ResourceClass::GlobalMetrics => 1,
            ResourceClass::SectorList => 2,
            ResourceClass::Watchlist => 3,
            ResourceClass::PriceHistory => 4,
            ResourceClass::CoinImageSet => 5,
        }
    }

    /// Short lowercase name used in cache keys and log fields.
    pub fn name(self) -> &'static str {
        match self {
            ResourceClass::MarketList => "market_list",
            ResourceClass::GlobalMetrics => "global_metrics",
            ResourceClass::SectorList => "sector_list",
            ResourceClass::Watchlist => "watchlist",
            ResourceClass::PriceHistory => "price_history",
            ResourceClass::CoinImageSet => "coin_images",
        }
    }

    /// The canonical policy for this class.
    pub fn policy(self) -> ClassPolicy {
        match self {
            ResourceClass::MarketList => ClassPolicy {
                ttl: Duration::from_secs(300),
                min_dispatch_interval: Duration::from_secs(10),
                max_attempts: 3,
                backoff_base: Duration::from_secs(2),
            },
            ResourceClass::GlobalMetrics => ClassPolicy {
                ttl: Duration::from_secs(600),
                min_dispatch_interval: Duration::from_secs(30),
                max_attempts: 3,
                backoff_base: Duration::from_secs(2),
            },
            ResourceClass::SectorList => ClassPolicy {
                ttl: Duration::from_secs(900),
                min_dispatch_interval: Duration::from_secs(60),
                max_attempts: 3,
                backoff_base: Duration::from_secs(2),
            },
            ResourceClass::Watchlist => ClassPolicy {
                ttl: Duration::from_secs(300),
                min_dispatch_interval: Duration::from_secs(10),
                max_attempts: 3,
                backoff_base: Duration::from_secs(2),
            },
            ResourceClass::PriceHistory => ClassPolicy {
                ttl: Duration::from_secs(600),
                min_dispatch_interval: Duration::from_secs(15),
                max_attempts: 3,
                backoff_base: Duration::from_secs(2),
            },
            // Images effectively never change; fetch rarely, retry little.
            ResourceClass::CoinImageSet => ClassPolicy {
                ttl: Duration::from_secs(86_400),
                min_dispatch_interval: Duration::from_secs(60),
                max_attempts: 2,
                backoff_base: Duration::from_secs(1),
            },
        }
    }
}

impl fmt::Display for ResourceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
