//! Coinfeed - cached, rate-limited market data access
//!
//! This library provides the data-access layer for cryptocurrency market
//! data clients: a two-tier cache (memory plus durable storage), a
//! per-class dispatch ledger, retry with exponential backoff, and
//! single-flight request coalescing, all behind one resolution call.
//!
//! # High-Level API
//!
//! The [`service`] module provides the facade most callers want:
//!
//! ```ignore
//! use coinfeed::resource::{models, ResourceKey};
//! use coinfeed::service::{DataService, ResolveOptions, ServiceConfig};
//!
//! let service = DataService::new(transport, blob, clock, ServiceConfig::default());
//!
//! let key = ResourceKey::market_list(1, "usd");
//! let outcome = service
//!     .resolve(&key, models::decode_market_list, ResolveOptions::default())
//!     .await;
//! ```
//!
//! Every resolution terminates in exactly one of `Fresh`, `Stale` or
//! `Failed`; stale data with a reason always beats an error when the
//! cache holds anything at all.

pub mod clock;
pub mod coalesce;
pub mod limiter;
pub mod logging;
pub mod resource;
pub mod retry;
pub mod service;
pub mod store;
pub mod transport;

/// Version of the coinfeed library.
///
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
