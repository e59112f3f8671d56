//! Terminal outcomes of a resolve call.

use super::error::FetchError;
use bytes::Bytes;

/// Why a stale value was served instead of a fresh one.
#[derive(Debug, Clone, PartialEq)]
pub enum StaleReason {
    /// The dispatch was refused by the local rate limiter.
    Throttled,
    /// The fetch ran and failed; this was the final error.
    Fetch(FetchError),
}

/// Bytes-level outcome, as broadcast through the coalescer and
/// subscription channels.
///
/// Payloads are [`Bytes`] so fanning an outcome out to many waiters clones
/// a reference count, not the body.
#[derive(Debug, Clone)]
pub enum RawOutcome {
    /// A value within its freshness window.
    Fresh(Bytes),
    /// A previously cached value of any age, served because a refresh
    /// could not produce a fresh one. Never silently presented as fresh.
    Stale(Bytes, StaleReason),
    /// No value available at all.
    Failed(FetchError),
}

impl RawOutcome {
    /// The payload, fresh or stale.
    pub fn payload(&self) -> Option<&Bytes> {
        match self {
            RawOutcome::Fresh(payload) | RawOutcome::Stale(payload, _) => Some(payload),
            RawOutcome::Failed(_) => None,
        }
    }

    /// Decodes the payload into a typed outcome, preserving the tag.
    ///
    /// A payload that fails to decode becomes `Failed(Decode)`; cached
    /// payloads are validated at write time, so this only fires when the
    /// caller's decoder disagrees with the catalog shape.
    pub fn decode<T, D>(self, decode: D) -> Outcome<T>
    where
        D: Fn(&[u8]) -> Result<T, serde_json::Error>,
    {
        match self {
            RawOutcome::Fresh(payload) => match decode(&payload) {
                Ok(value) => Outcome::Fresh(value),
                Err(e) => Outcome::Failed(FetchError::Decode(e.to_string())),
            },
            RawOutcome::Stale(payload, reason) => match decode(&payload) {
                Ok(value) => Outcome::Stale(value, reason),
                Err(e) => Outcome::Failed(FetchError::Decode(e.to_string())),
            },
            RawOutcome::Failed(error) => Outcome::Failed(error),
        }
    }
}

/// Typed outcome delivered to callers of `resolve`.
///
/// Exactly one of these is reached per call. `Stale` carries the reason so
/// the presentation layer can show a staleness indicator with a cause.
#[derive(Debug, Clone)]
pub enum Outcome<T> {
    /// Current value, within its freshness window.
    Fresh(T),
    /// Previously cached value served as a fallback; explicitly tagged.
    Stale(T, StaleReason),
    /// No value could be produced.
    Failed(FetchError),
}

impl<T> Outcome<T> {
    /// True for `Fresh`.
    pub fn is_fresh(&self) -> bool {
        matches!(self, Outcome::Fresh(_))
    }

    /// True for `Stale`.
    pub fn is_stale(&self) -> bool {
        matches!(self, Outcome::Stale(..))
    }

    /// The carried value, fresh or stale.
    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Fresh(value) | Outcome::Stale(value, _) => Some(value),
            Outcome::Failed(_) => None,
        }
    }

    /// Consumes the outcome, yielding the value if one was carried.
    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Fresh(value) | Outcome::Stale(value, _) => Some(value),
            Outcome::Failed(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_preserves_the_tag() {
        let payload = Bytes::from_static(b"[1,2,3]");
        let decode = |bytes: &[u8]| serde_json::from_slice::<Vec<u32>>(bytes);

        let fresh = RawOutcome::Fresh(payload.clone()).decode(decode);
        assert!(fresh.is_fresh());
        assert_eq!(fresh.value(), Some(&vec![1, 2, 3]));

        let stale = RawOutcome::Stale(payload, StaleReason::Throttled).decode(decode);
        assert!(stale.is_stale());
        assert_eq!(stale.into_value(), Some(vec![1, 2, 3]));
    }

    #[test]
    fn decode_failure_becomes_failed() {
        let outcome = RawOutcome::Fresh(Bytes::from_static(b"not json"))
            .decode(|bytes| serde_json::from_slice::<Vec<u32>>(bytes));
        assert!(matches!(outcome, Outcome::Failed(FetchError::Decode(_))));
    }

    #[test]
    fn failed_passes_through() {
        let outcome = RawOutcome::Failed(FetchError::Throttled)
            .decode(|bytes| serde_json::from_slice::<Vec<u32>>(bytes));
        assert!(matches!(outcome, Outcome::Failed(FetchError::Throttled)));
        assert_eq!(outcome.value(), None);
    }
}
