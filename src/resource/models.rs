//! Typed models for the upstream resource catalog.
//!
//! These structs mirror the minimal upstream JSON shapes. Unknown fields
//! are ignored so provider-side additions never break decoding; optional
//! fields follow the upstream contract (some coins report no 24h change,
//! some sectors carry no description).

use super::class::ResourceClass;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row of the market list (also the watchlist and image-set shape).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketCoin {
    pub id: String,
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    #[serde(default)]
    pub price_change_percentage_24h: Option<f64>,
    pub total_volume: f64,
    pub market_cap: f64,
    pub image: String,
}

/// Global market aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetrics {
    pub data: GlobalMetricsData,
}

/// Payload of the global metrics envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalMetricsData {
    pub market_cap_percentage: HashMap<String, f64>,
    pub total_market_cap: HashMap<String, f64>,
}

/// One market sector / category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sector {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub market_cap: Option<f64>,
    #[serde(default)]
    pub market_cap_change_24h: Option<f64>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub top_3_coins: Vec<String>,
}

/// Historical price series: `(epoch_millis, price)` pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceHistory {
    pub prices: Vec<(i64, f64)>,
}

impl PriceHistory {
    /// Points with their timestamps resolved to UTC datetimes.
    ///
    /// Rows whose epoch value falls outside the representable range are
    /// skipped rather than surfaced as an error.
    pub fn points(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.prices
            .iter()
            .filter_map(|&(millis, price)| DateTime::from_timestamp_millis(millis).map(|ts| (ts, price)))
    }
}

/// Decodes a market list (or watchlist / image set) payload.
pub fn decode_market_list(bytes: &[u8]) -> Result<Vec<MarketCoin>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Decodes the global metrics payload.
pub fn decode_global_metrics(bytes: &[u8]) -> Result<GlobalMetrics, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Decodes the sector listing payload.
pub fn decode_sector_list(bytes: &[u8]) -> Result<Vec<Sector>, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Decodes a price history payload.
pub fn decode_price_history(bytes: &[u8]) -> Result<PriceHistory, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Validates that `bytes` decode as the canonical shape for `class`.
///
/// The service runs this on every fetched response before a cache entry is
/// written, so a cached entry is always decodable. The decoded value is
/// dropped; callers re-decode into whichever typed view they need.
pub fn validate(class: ResourceClass, bytes: &[u8]) -> Result<(), serde_json::Error> {
    match class {
        ResourceClass::MarketList | ResourceClass::Watchlist | ResourceClass::CoinImageSet => {
            decode_market_list(bytes).map(|_| ())
        }
        ResourceClass::GlobalMetrics => decode_global_metrics(bytes).map(|_| ()),
        ResourceClass::SectorList => decode_sector_list(bytes).map(|_| ()),
        ResourceClass::PriceHistory => decode_price_history(bytes).map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MARKET_ROW: &str = r#"[{
        "id": "bitcoin",
        "symbol": "btc",
        "name": "Bitcoin",
        "current_price": 64250.0,
        "price_change_percentage_24h": -1.2,
        "total_volume": 28000000000.0,
        "market_cap": 1260000000000.0,
        "image": "https://img.example.com/bitcoin.png",
        "circulating_supply": 19700000.0
    }]"#;

    #[test]
    fn market_list_decodes_and_ignores_extras() {
        let coins = decode_market_list(MARKET_ROW.as_bytes()).unwrap();
        assert_eq!(coins.len(), 1);
        assert_eq!(coins[0].id, "bitcoin");
        assert_eq!(coins[0].price_change_percentage_24h, Some(-1.2));
    }

    #[test]
    fn market_row_without_change_field_decodes() {
        let json = r#"[{
            "id": "tether", "symbol": "usdt", "name": "Tether",
            "current_price": 1.0, "total_volume": 50000000000.0,
            "market_cap": 110000000000.0, "image": "https://img.example.com/t.png"
        }]"#;
        let coins = decode_market_list(json.as_bytes()).unwrap();
        assert_eq!(coins[0].price_change_percentage_24h, None);
    }

    #[test]
    fn global_metrics_decode() {
        let json = r#"{"data": {
            "market_cap_percentage": {"btc": 54.2, "eth": 16.1},
            "total_market_cap": {"usd": 2300000000000.0}
        }}"#;
        let metrics = decode_global_metrics(json.as_bytes()).unwrap();
        assert_eq!(metrics.data.market_cap_percentage["btc"], 54.2);
    }

    #[test]
    fn sector_list_defaults_optional_fields() {
        let json = r#"[{"id": "defi", "name": "DeFi"}]"#;
        let sectors = decode_sector_list(json.as_bytes()).unwrap();
        assert_eq!(sectors[0].market_cap, None);
        assert!(sectors[0].top_3_coins.is_empty());
    }

    #[test]
    fn price_history_decodes_pairs() {
        let json = r#"{"prices": [[1718000000000, 64000.5], [1718003600000, 64120.0]]}"#;
        let history = decode_price_history(json.as_bytes()).unwrap();
        assert_eq!(history.prices.len(), 2);
        assert_eq!(history.prices[0], (1_718_000_000_000, 64000.5));
    }

    #[test]
    fn price_history_points_resolve_utc_timestamps() {
        let history = PriceHistory {
            prices: vec![(1_718_000_000_000, 64000.5), (i64::MAX, 1.0)],
        };
        let points: Vec<_> = history.points().collect();
        assert_eq!(points.len(), 1, "out-of-range timestamp is skipped");
        assert_eq!(points[0].0.timestamp_millis(), 1_718_000_000_000);
        assert_eq!(points[0].1, 64000.5);
    }

    #[test]
    fn validate_rejects_wrong_shape() {
        // A market payload is not a valid global metrics envelope.
        assert!(validate(ResourceClass::GlobalMetrics, MARKET_ROW.as_bytes()).is_err());
        assert!(validate(ResourceClass::MarketList, MARKET_ROW.as_bytes()).is_ok());
    }

    #[test]
    fn validate_rejects_garbage() {
        for class in ResourceClass::ALL {
            assert!(validate(class, b"not json").is_err());
        }
    }
}
