//! Retry bounds and backoff delays for the transport.

use std::time::Duration;

use crate::http_client::HttpErrorKind;

/// Backoff strategy between transport attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between attempts.
    Fixed {
        /// Delay between attempts.
        delay: Duration,
    },
    /// Uses an exponential delay between attempts.
    ///
    /// The delay is `base * factor^retry`, capped at `max`, plus a random
    /// offset in `[0, jitter]` so concurrent per-symbol fetches do not retry
    /// in lockstep.
    Exponential {
        /// Delay before the first retry.
        base: Duration,
        /// Multiplicative factor for each subsequent retry.
        factor: f64,
        /// Cap applied before jitter.
        max: Duration,
        /// Upper bound of the additive random jitter.
        jitter: Duration,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(1_500),
            factor: 1.5,
            max: Duration::from_secs(5),
            jitter: Duration::from_millis(500),
        }
    }
}

impl Backoff {
    /// Delay before retry number `retry` (0-based).
    pub fn delay(self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped = if seconds.is_finite() {
                    seconds.clamp(0.0, max.as_secs_f64())
                } else {
                    max.as_secs_f64()
                };

                let jitter_ms = u64::try_from(jitter.as_millis()).unwrap_or(u64::MAX);
                let offset = if jitter_ms == 0 {
                    0
                } else {
                    fastrand::u64(0..=jitter_ms)
                };

                Duration::from_secs_f64(capped) + Duration::from_millis(offset)
            }
        }
    }
}

/// Attempt bound and backoff for one transport call.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one. Always at least 1.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::default(),
        }
    }
}

impl RetryConfig {
    pub fn fixed(delay: Duration, max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Only timeouts and connection failures are worth another attempt.
    pub const fn is_retryable(kind: HttpErrorKind) -> bool {
        matches!(kind, HttpErrorKind::Timeout | HttpErrorKind::Connect)
    }

    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        self.backoff.delay(retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_backoff() {
        let backoff = Backoff::Fixed {
            delay: Duration::from_millis(100),
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(7), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff_without_jitter() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: Duration::ZERO,
        };

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_exponential_backoff_jitter_is_additive_and_bounded() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            factor: 2.0,
            max: Duration::from_secs(1),
            jitter: Duration::from_millis(50),
        };

        for _ in 0..20 {
            let delay = backoff.delay(1);
            assert!(delay >= Duration::from_millis(200), "delay={delay:?}");
            assert!(delay <= Duration::from_millis(250), "delay={delay:?}");
        }
    }

    #[test]
    fn test_default_retry_config() {
        let config = RetryConfig::default();

        assert_eq!(config.max_attempts, 3);
        assert!(RetryConfig::is_retryable(HttpErrorKind::Timeout));
        assert!(RetryConfig::is_retryable(HttpErrorKind::Connect));
        assert!(!RetryConfig::is_retryable(HttpErrorKind::Other));
    }

    #[test]
    fn test_attempt_bound_is_at_least_one() {
        assert_eq!(RetryConfig::fixed(Duration::ZERO, 0).max_attempts, 1);
    }
}
