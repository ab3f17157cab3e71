//! # Backoff policy for crash-triggered restarts.
//!
//! [`BackoffPolicy`] controls how the relaunch delay grows across consecutive
//! crashes. It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for crash `n` is computed as `first × factor^n`, clamped to `max`,
//! then jitter is applied. Because the base delay is derived purely from the
//! crash counter, jitter output never feeds back into subsequent calculations.
//!
//! The default is `factor = 1.0`: a constant delay between relaunch attempts,
//! matching the fixed-interval recovery the server historically used. A
//! persistently-crashing command therefore retries indefinitely at a fixed
//! cadence unless the operator configures growth and a cap.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use servisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_secs(5),
//!     max: Duration::from_secs(300),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! assert_eq!(backoff.next(0), Duration::from_secs(5));
//! assert_eq!(backoff.next(1), Duration::from_secs(10));
//! // 5s × 2^10 = 5120s → capped at max=300s
//! assert_eq!(backoff.next(10), Duration::from_secs(300));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Relaunch backoff policy.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first relaunch.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy applied to the computed delay.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns a constant-delay policy:
    /// - `first = 5s` (the historical crash-recovery delay);
    /// - `factor = 1.0` (no growth);
    /// - `max = 300s`.
    fn default() -> Self {
        Self {
            first: Duration::from_secs(5),
            max: Duration::from_secs(300),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given crash number (0-indexed).
    ///
    /// The base delay is `first × factor^crash`, clamped to [`BackoffPolicy::max`],
    /// with jitter applied to the clamped base. Non-finite or overflowing
    /// intermediate values clamp to `max`.
    pub fn next(&self, crash: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = crash.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        self.jitter.apply(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_is_constant_five_seconds() {
        let policy = BackoffPolicy::default();
        for crash in 0..10 {
            assert_eq!(policy.next(crash), Duration::from_secs(5));
        }
    }

    #[test]
    fn exponential_growth_no_jitter() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(5),
            max: Duration::from_secs(300),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };

        assert_eq!(policy.next(0), Duration::from_secs(5));
        assert_eq!(policy.next(1), Duration::from_secs(10));
        assert_eq!(policy.next(2), Duration::from_secs(20));
        assert_eq!(policy.next(3), Duration::from_secs(40));
    }

    #[test]
    fn clamped_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(5),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(10), Duration::from_secs(60));
    }

    #[test]
    fn first_exceeds_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn huge_crash_count_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(5),
            max: Duration::from_secs(120),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(120));
    }

    #[test]
    fn full_jitter_bounded_by_base() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(5),
            max: Duration::from_secs(300),
            factor: 1.0,
            jitter: JitterPolicy::Full,
        };
        for _ in 0..50 {
            assert!(policy.next(3) <= Duration::from_secs(5));
        }
    }

    #[test]
    fn equal_jitter_bounds() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(4),
            max: Duration::from_secs(300),
            factor: 1.0,
            jitter: JitterPolicy::Equal,
        };
        for _ in 0..50 {
            let delay = policy.next(0);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_secs(4));
        }
    }
}
