//! Retry with exponential backoff, and a request rate limiter.
//!
//! Both are blocking: the Vault client runs synchronously inside template
//! evaluation.

use crate::error::{VaultifyError, VaultifyResult};
use governor::clock::{Clock, DefaultClock};
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as GovRateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 20,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[cfg(test)]
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }
}

/// Retry policy for executing operations with automatic retries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Calculate the delay for a given attempt number.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let base_ms =
            self.config.initial_delay.as_millis() as f64 * self.config.multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.config.max_delay.as_millis() as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Check if an error should be retried.
    pub fn should_retry(&self, error: &VaultifyError, attempt: u32) -> bool {
        attempt < self.config.max_retries && error.is_retryable()
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error, or
    /// the retry budget is spent. `on_retry` is told about every failed attempt
    /// that will be retried, with the delay about to be slept.
    pub fn execute<T, F, R>(&self, mut operation: F, mut on_retry: R) -> VaultifyResult<T>
    where
        F: FnMut() -> VaultifyResult<T>,
        R: FnMut(&VaultifyError, u32, Duration),
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(result) => return Ok(result),
                Err(error) => {
                    if !self.should_retry(&error, attempt) {
                        return Err(error);
                    }
                    let delay = self.delay_for_attempt(attempt);
                    on_retry(&error, attempt + 1, delay);
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

type DirectLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Request rate limiter: allows `burst` requests back to back, then one
/// every `interval`.
///
/// A zero interval disables limiting.
pub struct RateLimiter {
    limiter: Option<DirectLimiter>,
    clock: DefaultClock,
}

impl RateLimiter {
    pub fn new(interval: Duration, burst: u32) -> Self {
        let limiter = Quota::with_period(interval)
            .zip(NonZeroU32::new(burst))
            .map(|(quota, burst)| GovRateLimiter::direct(quota.allow_burst(burst)));
        Self {
            limiter,
            clock: DefaultClock::default(),
        }
    }

    /// Block until a request may be sent. Returns how long it waited.
    pub fn acquire(&self) -> Duration {
        let mut waited = Duration::ZERO;
        while let Err(wait) = self.try_acquire() {
            std::thread::sleep(wait);
            waited += wait;
        }
        waited
    }

    /// Take a request slot now, or return how long until one frees up.
    fn try_acquire(&self) -> Result<(), Duration> {
        match &self.limiter {
            Some(limiter) => limiter
                .check()
                .map_err(|not_until| not_until.wait_time_from(self.clock.now())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn instant_policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(
            RetryConfig::default()
                .with_max_retries(max_retries)
                .with_initial_delay(Duration::ZERO),
        )
    }

    #[test]
    fn test_delay_calculation() {
        let policy = RetryPolicy::new(
            RetryConfig::default().with_initial_delay(Duration::from_millis(100)),
        );

        assert_eq!(policy.delay_for_attempt(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(400));
    }

    #[test]
    fn test_max_delay_cap() {
        let policy = RetryPolicy::new(
            RetryConfig::default()
                .with_initial_delay(Duration::from_millis(100))
                .with_max_delay(Duration::from_millis(150)),
        );

        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(150));
        assert_eq!(policy.delay_for_attempt(40), Duration::from_millis(150));
    }

    #[test]
    fn test_should_retry() {
        let policy = instant_policy(3);
        let unavailable = VaultifyError::Unavailable("503".to_string());

        assert!(policy.should_retry(&unavailable, 0));
        assert!(policy.should_retry(&unavailable, 2));
        assert!(!policy.should_retry(&unavailable, 3));
        assert!(!policy.should_retry(&VaultifyError::NotFound("x".to_string()), 0));
    }

    #[test]
    fn test_execute_retries_until_success() {
        let policy = instant_policy(5);
        let calls = Cell::new(0);
        let mut retries = Vec::new();

        let result = policy.execute(
            || {
                calls.set(calls.get() + 1);
                if calls.get() < 3 {
                    Err(VaultifyError::Unavailable("connection reset".to_string()))
                } else {
                    Ok("done")
                }
            },
            |_, attempt, _| retries.push(attempt),
        );

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
        assert_eq!(retries, vec![1, 2]);
    }

    #[test]
    fn test_execute_gives_up_after_budget() {
        let policy = instant_policy(2);
        let calls = Cell::new(0);

        let result: VaultifyResult<()> = policy.execute(
            || {
                calls.set(calls.get() + 1);
                Err(VaultifyError::Unavailable("down".to_string()))
            },
            |_, _, _| {},
        );

        assert!(matches!(result, Err(VaultifyError::Unavailable(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_execute_does_not_retry_permanent_errors() {
        let policy = instant_policy(5);
        let calls = Cell::new(0);

        let result: VaultifyResult<()> = policy.execute(
            || {
                calls.set(calls.get() + 1);
                Err(VaultifyError::Unauthorized("denied".to_string()))
            },
            |_, _, _| {},
        );

        assert!(matches!(result, Err(VaultifyError::Unauthorized(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_rate_limiter_burst_then_wait() {
        let interval = Duration::from_secs(3600);
        let limiter = RateLimiter::new(interval, 2);

        assert_eq!(limiter.try_acquire(), Ok(()));
        assert_eq!(limiter.try_acquire(), Ok(()));

        let wait = limiter.try_acquire().unwrap_err();
        assert!(wait > Duration::ZERO && wait <= interval, "waited {:?}", wait);
        // A refused request does not take a slot
        assert!(limiter.try_acquire().is_err());
    }

    #[test]
    fn test_rate_limiter_waits_for_next_slot() {
        let limiter = RateLimiter::new(Duration::from_millis(20), 1);

        assert_eq!(limiter.acquire(), Duration::ZERO);
        let waited = limiter.acquire();
        assert!(waited > Duration::ZERO && waited <= Duration::from_millis(40));
    }

    #[test]
    fn test_zero_interval_disables_limiting() {
        let limiter = RateLimiter::new(Duration::ZERO, 1);
        for _ in 0..100 {
            assert_eq!(limiter.acquire(), Duration::ZERO);
        }
    }
}
