//! Fetch error taxonomy.
//!
//! Every error a resolve can encounter is absorbed before it reaches the
//! caller: it ends up inside an `Outcome::Stale` reason or an
//! `Outcome::Failed`. Callers never see a raw transport exception.

use crate::transport::TransportError;
use thiserror::Error;

/// Terminal error carried by an outcome.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// The transport failed (timeout, connection, non-2xx status other
    /// than 429).
    #[error(transparent)]
    Transport(TransportError),

    /// The upstream answered HTTP 429.
    #[error("rate limited by upstream")]
    RateLimited,

    /// The local dispatch ledger refused the request before any network
    /// activity.
    #[error("throttled by local dispatch ledger")]
    Throttled,

    /// The response body did not match the resource's catalog shape.
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl FetchError {
    /// Maps a transport error, pulling HTTP 429 out into [`RateLimited`].
    ///
    /// [`RateLimited`]: FetchError::RateLimited
    pub fn from_transport(error: TransportError) -> Self {
        if error.is_rate_limit() {
            FetchError::RateLimited
        } else {
            FetchError::Transport(error)
        }
    }

    /// Whether another attempt could plausibly succeed.
    ///
    /// Transient transport trouble and server-side errors are retryable;
    /// client errors and undecodable payloads are not, and local throttling
    /// terminates the attempt loop rather than retrying inside it.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Transport(TransportError::Timeout)
            | FetchError::Transport(TransportError::ConnectionFailed(_)) => true,
            FetchError::Transport(TransportError::HttpStatus(status)) => {
                (500..600).contains(status)
            }
            FetchError::RateLimited => true,
            FetchError::Throttled | FetchError::Decode(_) => false,
        }
    }
}
