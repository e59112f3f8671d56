//! Resource identity and upstream URL construction.
//!
//! A [`ResourceKey`] names one independently-cacheable unit of upstream
//! data. Two keys identify the same resource iff their class and parameters
//! match exactly; equality and hashing cover the full parameter tuple so a
//! page-2 market list never aliases page 1, and a 7-day price history never
//! aliases the 30-day series for the same coin.

use super::class::ResourceClass;
use std::fmt;

/// Parameters distinguishing resources within a class.
///
/// Kept as an enum rather than a string map so identity is exact: there is
/// no way to construct two keys for the same resource that differ only in
/// parameter spelling or ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceParams {
    /// One page of the coin market list in a quote currency.
    MarketList { page: u32, currency: String },
    /// Global aggregates; a singleton resource.
    GlobalMetrics,
    /// Sector listing; a singleton resource.
    SectorList,
    /// Market rows for a chosen set of coins. Ids are stored sorted so the
    /// same set coalesces regardless of caller ordering.
    Watchlist {
        coin_ids: Vec<String>,
        currency: String,
    },
    /// Price series for one coin over a trailing day window.
    PriceHistory {
        coin_id: String,
        days: u32,
        currency: String,
    },
    /// Image metadata for a set of coins; ids stored sorted.
    CoinImageSet { coin_ids: Vec<String> },
}

/// Identifier for one logical upstream resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceKey {
    params: ResourceParams,
}

impl ResourceKey {
    /// Key for one page of the market list.
    pub fn market_list(page: u32, currency: impl Into<String>) -> Self {
        Self {
            params: ResourceParams::MarketList {
                page,
                currency: currency.into(),
            },
        }
    }

    /// Key for the global market metrics singleton.
    pub fn global_metrics() -> Self {
        Self {
            params: ResourceParams::GlobalMetrics,
        }
    }

    /// Key for the sector listing singleton.
    pub fn sector_list() -> Self {
        Self {
            params: ResourceParams::SectorList,
        }
    }

    /// Key for a watchlist over the given coin ids.
    ///
    /// Ids are sorted and deduplicated; `["btc", "eth"]` and
    /// `["eth", "btc", "eth"]` produce the same key.
    pub fn watchlist<I, S>(coin_ids: I, currency: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = coin_ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        Self {
            params: ResourceParams::Watchlist {
                coin_ids: ids,
                currency: currency.into(),
            },
        }
    }

    /// Key for a coin's trailing price history.
    pub fn price_history(coin_id: impl Into<String>, days: u32, currency: impl Into<String>) -> Self {
        Self {
            params: ResourceParams::PriceHistory {
                coin_id: coin_id.into(),
                days,
                currency: currency.into(),
            },
        }
    }

    /// Key for image metadata over the given coin ids (sorted, deduplicated).
    pub fn coin_images<I, S>(coin_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ids: Vec<String> = coin_ids.into_iter().map(Into::into).collect();
        ids.sort();
        ids.dedup();
        Self {
            params: ResourceParams::CoinImageSet { coin_ids: ids },
        }
    }

    /// The class this key belongs to.
    pub fn class(&self) -> ResourceClass {
        match self.params {
            ResourceParams::MarketList { .. } => ResourceClass::MarketList,
            ResourceParams::GlobalMetrics => ResourceClass::GlobalMetrics,
            ResourceParams::SectorList => ResourceClass::SectorList,
            ResourceParams::Watchlist { .. } => ResourceClass::Watchlist,
            ResourceParams::PriceHistory { .. } => ResourceClass::PriceHistory,
            ResourceParams::CoinImageSet { .. } => ResourceClass::CoinImageSet,
        }
    }

    /// The key's parameters.
    pub fn params(&self) -> &ResourceParams {
        &self.params
    }

    /// Stable storage name for the durable tier, shaped `class/detail`.
    ///
    /// Must stay injective: distinct keys must map to distinct names, or two
    /// resources would overwrite each other's persisted blobs.
    pub fn storage_name(&self) -> String {
        match &self.params {
            ResourceParams::MarketList { page, currency } => {
                format!("market_list/p{}-{}", page, currency)
            }
            ResourceParams::GlobalMetrics => "global_metrics/all".to_string(),
            ResourceParams::SectorList => "sector_list/all".to_string(),
            ResourceParams::Watchlist { coin_ids, currency } => {
                format!("watchlist/{}-{}", coin_ids.join("_"), currency)
            }
            ResourceParams::PriceHistory {
                coin_id,
                days,
                currency,
            } => format!("price_history/{}-{}d-{}", coin_id, days, currency),
            ResourceParams::CoinImageSet { coin_ids } => {
                format!("coin_images/{}", coin_ids.join("_"))
            }
        }
    }

    /// Builds the upstream request URL for this resource.
    ///
    /// `base_url` is the API root without a trailing slash, e.g.
    /// `https://api.coingecko.com/api/v3`.
    pub fn request_url(&self, base_url: &str) -> String {
        match &self.params {
            ResourceParams::MarketList { page, currency } => format!(
                "{}/coins/markets?vs_currency={}&order=market_cap_desc&per_page=100&page={}&sparkline=false",
                base_url, currency, page
            ),
            ResourceParams::GlobalMetrics => format!("{}/global", base_url),
            ResourceParams::SectorList => format!("{}/coins/categories", base_url),
            ResourceParams::Watchlist { coin_ids, currency } => format!(
                "{}/coins/markets?vs_currency={}&ids={}&order=market_cap_desc&sparkline=false",
                base_url,
                currency,
                coin_ids.join("%2C")
            ),
            ResourceParams::PriceHistory {
                coin_id,
                days,
                currency,
            } => format!(
                "{}/coins/{}/market_chart?vs_currency={}&days={}",
                base_url, coin_id, currency, days
            ),
            ResourceParams::CoinImageSet { coin_ids } => format!(
                "{}/coins/markets?vs_currency=usd&ids={}&sparkline=false",
                base_url,
                coin_ids.join("%2C")
            ),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_name())
    }
}
