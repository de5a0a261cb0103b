//! Reconnect and retry delays with exponential backoff and jitter

use std::time::Duration;

use rand::Rng;

/// Backoff strategy between failed fetches or reconnect attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Uses a fixed delay between retries.
    Fixed { delay: Duration },
    /// Delay is `base * factor^attempt`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        /// Spread each delay over +/- 50%, never above `max`
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_secs(1),
            factor: 2.0,
            max: Duration::from_secs(30),
            jitter: true,
        }
    }
}

impl Backoff {
    pub fn exponential(base: Duration, max: Duration, jitter: bool) -> Self {
        Self::Exponential {
            base,
            factor: 2.0,
            max: max.max(base),
            jitter,
        }
    }

    /// Delay before retry `attempt` (0-based: the first retry uses 0)
    pub fn delay(self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let exponent = attempt.min(i32::MAX as u32) as i32;
                let seconds = base.as_secs_f64() * factor.powi(exponent);
                let capped_seconds = if seconds.is_finite() {
                    seconds.min(max.as_secs_f64())
                } else {
                    max.as_secs_f64()
                };

                let delay = Duration::from_secs_f64(capped_seconds);
                if !jitter {
                    return delay;
                }

                let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                let offset = rand::rng().random_range(0..=jitter_ms * 2);
                let total_ms = delay.as_millis() as i64 + offset as i64 - jitter_ms as i64;
                Duration::from_millis(total_ms.max(0) as u64).min(max)
            }
        }
    }

    /// Upper bound of any delay this strategy produces
    pub fn max_delay(self) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential { max, .. } => max,
        }
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
        assert_eq!(backoff.delay(10), Duration::from_millis(100));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_secs(1), false);

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_secs(1));
        assert_eq!(backoff.delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = Backoff::exponential(Duration::from_millis(100), Duration::from_secs(1), true);

        for _ in 0..50 {
            for attempt in 0..6 {
                let delay_ms = backoff.delay(attempt).as_millis() as f64;
                let expected = (100.0 * 2_f64.powi(attempt as i32)).min(1000.0);

                assert!(delay_ms >= expected * 0.49, "attempt={} delay_ms={}", attempt, delay_ms);
                assert!(delay_ms <= 1000.0, "attempt={} delay_ms={}", attempt, delay_ms);
            }
        }
    }

    #[test]
    fn test_max_never_below_base() {
        let backoff = Backoff::exponential(Duration::from_secs(5), Duration::from_secs(1), false);
        assert_eq!(backoff.delay(0), Duration::from_secs(5));
        assert_eq!(backoff.max_delay(), Duration::from_secs(5));
    }
}
