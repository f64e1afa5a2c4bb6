//! # Backoff between consecutive restarts of one service.
//!
//! [`BackoffPolicy`] controls how long the supervisor waits before restarting a
//! service that keeps crashing:
//! - [`BackoffPolicy::first`] the delay before the first restart;
//! - [`BackoffPolicy::factor`] the multiplicative growth per consecutive crash;
//! - [`BackoffPolicy::max`] the cap.
//!
//! The delay for the `n`-th consecutive restart (0-indexed) is `first × factor^n`,
//! clamped to `max`, then jittered. The base never depends on a previously
//! jittered value.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use pushvisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(500),
//!     max: Duration::from_secs(5),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_millis(500));
//! assert_eq!(backoff.next(2), Duration::from_secs(2));
//! assert_eq!(backoff.next(10), Duration::from_secs(5));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Restart backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay before the first restart.
    pub first: Duration,
    /// Maximum delay.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Randomization applied to each delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// `first = 500ms`, `max = 30s`, `factor = 2.0`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay before the `attempt`-th consecutive restart (0-indexed).
    pub fn next(&self, attempt: u32) -> Duration {
        let exp = attempt.min(i32::MAX as u32) as i32;
        let secs = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !secs.is_finite() || secs < 0.0 || secs > self.max.as_secs_f64() {
            self.max
        } else {
            Duration::from_secs_f64(secs)
        };

        self.jitter.apply(base, self.first.min(self.max), self.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(first_ms: u64, max_ms: u64, factor: f64, jitter: JitterPolicy) -> BackoffPolicy {
        BackoffPolicy {
            first: Duration::from_millis(first_ms),
            max: Duration::from_millis(max_ms),
            factor,
            jitter,
        }
    }

    #[test]
    fn grows_exponentially_without_jitter() {
        let p = policy(100, 30_000, 2.0, JitterPolicy::None);
        assert_eq!(p.next(0), Duration::from_millis(100));
        assert_eq!(p.next(1), Duration::from_millis(200));
        assert_eq!(p.next(2), Duration::from_millis(400));
        assert_eq!(p.next(3), Duration::from_millis(800));
    }

    #[test]
    fn constant_factor_keeps_first() {
        let p = policy(500, 30_000, 1.0, JitterPolicy::None);
        for attempt in 0..10 {
            assert_eq!(p.next(attempt), Duration::from_millis(500), "attempt {attempt}");
        }
    }

    #[test]
    fn clamps_to_max_including_overflow() {
        let p = policy(100, 1_000, 2.0, JitterPolicy::None);
        assert_eq!(p.next(10), Duration::from_secs(1));
        assert_eq!(p.next(u32::MAX), Duration::from_secs(1));

        let inverted = policy(10_000, 5_000, 2.0, JitterPolicy::None);
        assert_eq!(inverted.next(0), Duration::from_secs(5));
    }

    #[test]
    fn equal_jitter_stays_within_half_and_base() {
        let p = policy(1_000, 30_000, 1.0, JitterPolicy::Equal);
        for attempt in 0..50 {
            let d = p.next(attempt);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(1_000));
        }
    }

    #[test]
    fn full_jitter_never_exceeds_base() {
        let p = policy(100, 30_000, 2.0, JitterPolicy::Full);
        for attempt in 0..12 {
            let base = Duration::from_millis(100 * 2u64.pow(attempt)).min(Duration::from_secs(30));
            assert!(p.next(attempt) <= base);
        }
    }
}
