//! Request pacing.
//!
//! [`RateLimiter`] spaces out the paced calls of the enricher and the
//! builder and widens that spacing whenever the service reports rate
//! limiting. [`Backoff`] is the retry schedule of the HTTP client.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

const DEFAULT_INTERVAL_MS: u64 = 100;
const DEFAULT_MAX_INTERVAL_MS: u64 = 5_000;
const DEFAULT_BACKOFF_BASE_MS: u64 = 500;
const MAX_BACKOFF_EXPONENT: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Minimum spacing between paced calls when the service is healthy.
    pub interval: Duration,
    /// Upper bound the spacing may grow to under rate limiting.
    pub max_interval: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        PacingConfig {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            max_interval: Duration::from_millis(DEFAULT_MAX_INTERVAL_MS),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    last: Option<Instant>,
    interval: Duration,
}

/// Adaptive minimum-interval limiter.
#[derive(Debug)]
pub struct RateLimiter {
    base: Duration,
    max: Duration,
    state: Mutex<LimiterState>,
}

impl RateLimiter {
    pub fn new(config: PacingConfig) -> Self {
        let max = config.max_interval.max(config.interval);
        RateLimiter {
            base: config.interval,
            max,
            state: Mutex::new(LimiterState {
                last: None,
                interval: config.interval,
            }),
        }
    }

    /// A limiter that never sleeps.
    pub fn unlimited() -> Self {
        RateLimiter::new(PacingConfig {
            interval: Duration::ZERO,
            max_interval: Duration::ZERO,
        })
    }

    /// Waits until the current interval has elapsed since the previous call.
    pub async fn wait(&self) {
        let mut state = self.state.lock().await;

        if let Some(last) = state.last {
            let elapsed = last.elapsed();
            if elapsed < state.interval {
                let wait_time = state.interval - elapsed;
                tracing::debug!("Pacing: waiting {:?}", wait_time);
                tokio::time::sleep(wait_time).await;
            }
        }

        state.last = Some(Instant::now());
    }

    /// Doubles the interval, up to the configured ceiling. Returns the new interval.
    pub async fn throttled(&self) -> Duration {
        let mut state = self.state.lock().await;
        let widened = if state.interval.is_zero() {
            self.base.min(self.max)
        } else {
            state.interval.saturating_mul(2)
        };
        state.interval = widened.min(self.max);
        tracing::warn!("Rate limited, pacing interval now {:?}", state.interval);
        state.interval
    }

    /// Halves the interval back toward the base after a successful call.
    pub async fn relaxed(&self) {
        let mut state = self.state.lock().await;
        if state.interval > self.base {
            state.interval = (state.interval / 2).max(self.base);
        }
    }

    pub async fn interval(&self) -> Duration {
        self.state.lock().await.interval
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(PacingConfig::default())
    }
}

/// Bounded exponential retry schedule.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base: Duration,
}

impl Backoff {
    pub fn new(max_attempts: u32) -> Self {
        Backoff::with_base(max_attempts, Duration::from_millis(DEFAULT_BACKOFF_BASE_MS))
    }

    pub fn with_base(max_attempts: u32, base: Duration) -> Self {
        Backoff {
            attempt: 0,
            max_attempts,
            base,
        }
    }

    /// Delay before the next retry, or `None` once the retries are used up.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }
        self.attempt += 1;
        let factor = 2u32.pow((self.attempt - 1).min(MAX_BACKOFF_EXPONENT));
        Some(self.base * factor)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_then_stops() {
        let mut backoff = Backoff::with_base(3, Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_delay(), Some(Duration::from_millis(400)));
        assert_eq!(backoff.next_delay(), None);
        assert!(backoff.is_exhausted());
        assert_eq!(backoff.attempts(), 3);
    }

    #[test]
    fn zero_retries_never_delays() {
        let mut backoff = Backoff::new(0);
        assert_eq!(backoff.next_delay(), None);
    }

    #[tokio::test]
    async fn throttling_widens_and_relaxing_narrows() {
        let limiter = RateLimiter::new(PacingConfig {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(300),
        });

        assert_eq!(limiter.throttled().await, Duration::from_millis(200));
        assert_eq!(limiter.throttled().await, Duration::from_millis(300));
        assert_eq!(limiter.throttled().await, Duration::from_millis(300));

        limiter.relaxed().await;
        assert_eq!(limiter.interval().await, Duration::from_millis(150));
        limiter.relaxed().await;
        assert_eq!(limiter.interval().await, Duration::from_millis(100));
        limiter.relaxed().await;
        assert_eq!(limiter.interval().await, Duration::from_millis(100));
    }

    #[tokio::test]
    async fn wait_spaces_calls() {
        let limiter = RateLimiter::new(PacingConfig {
            interval: Duration::from_millis(30),
            max_interval: Duration::from_millis(30),
        });
        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[tokio::test]
    async fn unlimited_stays_unlimited() {
        let limiter = RateLimiter::unlimited();
        assert_eq!(limiter.throttled().await, Duration::ZERO);
        limiter.wait().await;
        limiter.wait().await;
    }
}
