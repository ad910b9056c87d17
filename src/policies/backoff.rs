//! # Backoff between restart attempts.
//!
//! The delay after the `n`-th consecutive failed restart (0-indexed) is
//! `first × factor^n`, clamped to `max`, then jittered. The base delay is
//! derived from the failure count alone, so jitter never feeds back into
//! later delays.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use servicevisor::BackoffPolicy;
//!
//! let backoff = BackoffPolicy::default();
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(1));
//! assert_eq!(backoff.next(1), Duration::from_secs(2));
//! assert_eq!(backoff.next(3), Duration::from_secs(8));
//! // 1s × 2^6 = 64s → capped at 60s
//! assert_eq!(backoff.next(6), Duration::from_secs(60));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff policy.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed restart.
    pub first: Duration,
    /// Upper bound for any delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` keeps delays non-decreasing).
    pub factor: f64,
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 1s`, `factor = 2.0`, `max = 60s`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(1),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Policy with a fixed delay and no growth.
    pub fn constant(delay: Duration) -> Self {
        Self {
            first: delay,
            max: delay,
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }

    #[must_use]
    pub fn with_jitter(mut self, jitter: JitterPolicy) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the restart that follows `failures` consecutive
    /// failures beyond the first (0-indexed).
    pub fn next(&self, failures: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = failures.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if secs.is_finite() && secs >= 0.0 && secs < max_secs {
            Duration::try_from_secs_f64(secs).unwrap_or(self.max)
        } else {
            self.max
        };
        self.jitter.apply(base)
    }
}
