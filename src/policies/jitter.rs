//! # Jitter for restart delays.
//!
//! [`JitterPolicy`] randomizes restart delays so that several services crashing
//! together (for example after a shared dependency hiccup) do not come back in
//! lock-step.
//!
//! - [`JitterPolicy::None`]: exact delay
//! - [`JitterPolicy::Full`]: random in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2 + random[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: random in `[floor, min(delay * 3, max)]`

use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Randomization strategy applied on top of a computed backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JitterPolicy {
    /// Use the exact delay.
    #[default]
    None,
    /// Random delay in `[0, delay]`.
    Full,
    /// `delay/2 + random[0, delay/2]`; keeps roughly three quarters of the delay.
    Equal,
    /// Random delay in `[floor, min(delay * 3, max)]`.
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `floor` and `max` are only consulted by [`JitterPolicy::Decorrelated`].
    pub fn apply(self, delay: Duration, floor: Duration, max: Duration) -> Duration {
        let ms = millis(delay);
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full if ms == 0 => Duration::ZERO,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let spread = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + spread)
            }
            JitterPolicy::Decorrelated => {
                let lo = millis(floor);
                let hi = ms.saturating_mul(3).min(millis(max)).max(lo);
                if lo >= hi {
                    return floor;
                }
                Duration::from_millis(rand::rng().random_range(lo..=hi))
            }
        }
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_is_identity() {
        let d = Duration::from_millis(750);
        assert_eq!(JitterPolicy::None.apply(d, Duration::ZERO, d), d);
    }

    #[test]
    fn zero_delay_stays_zero() {
        for policy in [JitterPolicy::Full, JitterPolicy::Equal] {
            assert_eq!(
                policy.apply(Duration::ZERO, Duration::ZERO, Duration::ZERO),
                Duration::ZERO
            );
        }
    }

    #[test]
    fn decorrelated_respects_floor_and_cap() {
        let floor = Duration::from_millis(100);
        let max = Duration::from_millis(900);
        for _ in 0..100 {
            let d = JitterPolicy::Decorrelated.apply(Duration::from_millis(500), floor, max);
            assert!(d >= floor && d <= max, "{d:?} out of range");
        }
    }
}
