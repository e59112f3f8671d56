//! Retry policy: exponential backoff with error classification.
//!
//! Pure decision logic, no sleeping and no state. The service consults the
//! policy after each failed attempt and either sleeps the returned delay or
//! stops the attempt loop.

use crate::resource::ClassPolicy;
use crate::service::FetchError;
use std::time::Duration;

/// Decision after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then try again.
    Delay(Duration),
    /// Stop; no further attempts.
    GiveUp,
}

/// Exponential backoff policy for one resource class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
}

impl RetryPolicy {
    /// Creates a policy allowing `max_attempts` transport calls in total.
    pub fn new(max_attempts: u32, backoff_base: Duration) -> Self {
        Self {
            max_attempts,
            backoff_base,
        }
    }

    /// Derives the policy from a class policy table row.
    pub fn from_class(policy: &ClassPolicy) -> Self {
        Self::new(policy.max_attempts, policy.backoff_base)
    }

    /// Maximum number of transport calls this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decision after `attempts_made` failed attempts ending in `error`.
    ///
    /// `attempts_made` counts completed transport calls and therefore starts
    /// at 1 on first consultation. The delay doubles per attempt:
    /// `backoff_base * 2^attempts_made`, so a base of 2s yields 4s then 8s
    /// before giving up at three attempts. Non-retryable errors (client
    /// mistakes, undecodable payloads) give up immediately regardless of
    /// the attempt count.
    pub fn next_delay(&self, attempts_made: u32, error: &FetchError) -> RetryDecision {
        if !error.is_retryable() || attempts_made >= self.max_attempts {
            return RetryDecision::GiveUp;
        }

        let factor = 2u32.saturating_pow(attempts_made.min(16));
        RetryDecision::Delay(self.backoff_base.saturating_mul(factor))
    }
}
