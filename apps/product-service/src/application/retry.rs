//! Backoff for idempotent store reads.
//!
//! Only reads are retried, and only on transient store failures
//! ([`CatalogError::Unavailable`](crate::domain::catalog::CatalogError)).
//! Writes are never retried.
//!
//! # Example
//!
//! ```rust,ignore
//! use product_service::application::{Backoff, RetryPolicy};
//!
//! let policy = RetryPolicy::default();
//! let mut backoff = Backoff::new(&policy);
//!
//! let first = backoff.next_delay(); // ~50ms
//! let second = backoff.next_delay(); // ~100ms
//! ```

use std::time::Duration;

use rand::Rng;

/// How many times, and how far apart, a failed read is retried.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first call.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay, jitter included.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
    /// Relative spread applied to each delay, e.g. `0.2` for ±20%.
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50), Duration::from_secs(1), 2.0, 0.2)
    }
}

impl RetryPolicy {
    /// Build a policy from explicit settings.
    #[must_use]
    pub const fn new(
        max_attempts: u32,
        initial_backoff: Duration,
        max_backoff: Duration,
        backoff_multiplier: f64,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_backoff,
            max_backoff,
            backoff_multiplier,
            jitter_factor,
        }
    }

    /// Policy that never retries.
    #[must_use]
    pub const fn disabled() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, 1.0, 0.0)
    }

    /// Un-jittered delay before retry number `retry` (zero-based), capped.
    #[must_use]
    pub fn base_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let nanos = self.initial_backoff.as_nanos() as f64 * self.backoff_multiplier.powi(exponent);
        let cap = self.max_backoff.as_nanos() as f64;
        if !nanos.is_finite() || nanos >= cap {
            return self.max_backoff;
        }
        Duration::from_nanos(nanos.max(0.0) as u64)
    }

    fn jitter(&self, delay: Duration) -> Duration {
        if self.jitter_factor <= 0.0 || delay.is_zero() {
            return delay;
        }
        let spread = self.jitter_factor.min(1.0);
        let factor = rand::rng().random_range((1.0 - spread)..=(1.0 + spread));
        delay.mul_f64(factor).min(self.max_backoff)
    }
}

/// Retry state for one read: hands out delays until the policy is spent.
#[derive(Debug)]
pub struct Backoff<'a> {
    policy: &'a RetryPolicy,
    retries: u32,
}

impl<'a> Backoff<'a> {
    /// Fresh state for `policy`.
    #[must_use]
    pub const fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy, retries: 0 }
    }

    /// Delay before the next retry, or `None` once the policy is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.has_remaining() {
            return None;
        }
        let delay = self.policy.jitter(self.policy.base_delay(self.retries));
        self.retries += 1;
        Some(delay)
    }

    /// Retries handed out so far.
    #[must_use]
    pub const fn retries(&self) -> u32 {
        self.retries
    }

    /// True while another retry is allowed.
    #[must_use]
    pub const fn has_remaining(&self) -> bool {
        self.retries < self.policy.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn steady(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(100),
            Duration::from_millis(350),
            2.0,
            0.0,
        )
    }

    #[test]
    fn test_delays_double_until_capped() {
        let policy = steady(4);
        let delays: Vec<_> = std::iter::from_fn({
            let mut backoff = Backoff::new(&policy);
            move || backoff.next_delay()
        })
        .map(|d| d.as_millis())
        .collect();
        assert_eq!(delays, vec![100, 200, 350, 350]);
    }

    #[test]
    fn test_retry_count_and_exhaustion() {
        let policy = steady(1);
        let mut backoff = Backoff::new(&policy);
        assert!(backoff.has_remaining());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.retries(), 1);
        assert!(!backoff.has_remaining());
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn test_jittered_delays_stay_in_band() {
        let policy = RetryPolicy::new(
            50,
            Duration::from_millis(100),
            Duration::from_secs(10),
            1.0,
            0.2,
        );
        let mut backoff = Backoff::new(&policy);
        while let Some(delay) = backoff.next_delay() {
            let ms = delay.as_millis();
            assert!((80..=120).contains(&ms), "jittered delay {ms}ms out of band");
        }
    }

    #[test]
    fn test_huge_exponent_saturates_at_cap() {
        let policy = steady(u32::MAX);
        assert_eq!(policy.base_delay(10_000), Duration::from_millis(350));
    }

    #[test]
    fn test_disabled_policy_never_retries() {
        let policy = RetryPolicy::disabled();
        assert_eq!(Backoff::new(&policy).next_delay(), None);
    }
}
