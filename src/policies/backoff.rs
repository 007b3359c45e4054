//! # Backoff policy for respawning crashed workers.
//!
//! [`BackoffPolicy`] controls how respawn delays grow after repeated
//! worker deaths in the same slot. It is parameterized by:
//! - [`BackoffPolicy::factor`] the multiplicative growth factor;
//! - [`BackoffPolicy::first`] the initial delay;
//! - [`BackoffPolicy::max`] the maximum delay cap.
//!
//! The delay for death `n` (0-indexed) is `first × factor^n`, clamped to
//! `max`, then jitter is applied. The base delay derives purely from the
//! death count, so jitter output never feeds back into subsequent
//! calculations.
//!
//! The default policy respawns immediately (`first = 0`): a dead worker is
//! always replaced without delay, indefinitely. Operators who need a
//! respawn-storm guard configure a non-zero `first` and a `factor > 1`.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use servisor::{BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//! };
//!
//! // First death — uses 'first' (100ms).
//! assert_eq!(backoff.next(0), Duration::from_millis(100));
//!
//! // Second death — first × factor^1 = 200ms.
//! assert_eq!(backoff.next(1), Duration::from_millis(200));
//!
//! // Death 10 — 100ms × 2^10 = 102_400ms → capped at max=10s.
//! assert_eq!(backoff.next(10), Duration::from_secs(10));
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Respawn backoff policy.
///
/// Encapsulates parameters that determine how respawn delays grow:
/// - [`BackoffPolicy::factor`] — multiplicative growth factor;
/// - [`BackoffPolicy::first`] — the initial delay;
/// - [`BackoffPolicy::max`] — the maximum delay cap.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Initial delay before the first respawn.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter policy to spread synchronized respawns.
    pub jitter: JitterPolicy,
}

impl Default for BackoffPolicy {
    /// Returns the immediate-respawn policy:
    /// - `first = 0` (a dead worker is replaced without delay);
    /// - `factor = 1.0`;
    /// - `max = 30s`.
    fn default() -> Self {
        Self {
            first: Duration::ZERO,
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given death count (0-indexed).
    ///
    /// The base delay is `first × factor^deaths`, clamped to
    /// [`BackoffPolicy::max`]. Jitter is applied to the clamped base; the
    /// result is never fed back into subsequent calculations.
    pub fn next(&self, deaths: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let clamped_exp = deaths.min(i32::MAX as u32) as i32;
        let unclamped_secs = self.first.as_secs_f64() * self.factor.powi(clamped_exp);

        let base =
            if !unclamped_secs.is_finite() || unclamped_secs < 0.0 || unclamped_secs > max_secs {
                self.max
            } else {
                Duration::from_secs_f64(unclamped_secs)
            };

        match self.jitter {
            JitterPolicy::Decorrelated => {
                self.jitter
                    .apply_decorrelated(self.first.min(self.max), base, self.max)
            }
            _ => self.jitter.apply(base),
        }
    }

    /// True if this policy never delays a respawn.
    pub fn is_immediate(&self) -> bool {
        self.first == Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_respawns_immediately() {
        let policy = BackoffPolicy::default();
        assert!(policy.is_immediate());
        for deaths in 0..20 {
            assert_eq!(policy.next(deaths), Duration::ZERO);
        }
    }

    #[test]
    fn first_death_uses_first_delay() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_millis(100));
    }

    #[test]
    fn exponential_growth_no_jitter() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };

        assert_eq!(policy.next(0), Duration::from_millis(100));
        assert_eq!(policy.next(1), Duration::from_millis(200));
        assert_eq!(policy.next(2), Duration::from_millis(400));
        assert_eq!(policy.next(3), Duration::from_millis(800));
    }

    #[test]
    fn constant_factor_stays_flat() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(500),
            max: Duration::from_secs(30),
            factor: 1.0,
            jitter: JitterPolicy::None,
        };
        for deaths in 0..10 {
            assert_eq!(
                policy.next(deaths),
                Duration::from_millis(500),
                "death {} should be constant at 500ms",
                deaths
            );
        }
    }

    #[test]
    fn clamped_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(1),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(10), Duration::from_secs(1));
    }

    #[test]
    fn first_exceeding_max_is_clamped() {
        let policy = BackoffPolicy {
            first: Duration::from_secs(10),
            max: Duration::from_secs(5),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(0), Duration::from_secs(5));
    }

    #[test]
    fn full_jitter_stays_under_base() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Full,
        };

        for deaths in 5..15 {
            let base_ms = 100.0 * 2.0f64.powi(deaths as i32);
            let delay = policy.next(deaths);
            assert!(
                delay <= Duration::from_millis(base_ms as u64),
                "death {}: delay {:?} exceeds base {}ms",
                deaths,
                delay,
                base_ms
            );
        }
    }

    #[test]
    fn equal_jitter_keeps_half_floor() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(30),
            factor: 2.0,
            jitter: JitterPolicy::Equal,
        };

        for deaths in 0..15 {
            let base_ms = (100.0 * 2.0f64.powi(deaths as i32)).min(30_000.0);
            let half = base_ms / 2.0;
            let delay = policy.next(deaths);
            assert!(
                delay >= Duration::from_millis(half as u64),
                "death {}: delay {:?} < half of base {}ms",
                deaths,
                delay,
                base_ms
            );
            assert!(
                delay <= Duration::from_millis(base_ms as u64),
                "death {}: delay {:?} > base {}ms",
                deaths,
                delay,
                base_ms
            );
        }
    }

    #[test]
    fn huge_death_count_clamps_to_max() {
        let policy = BackoffPolicy {
            first: Duration::from_millis(100),
            max: Duration::from_secs(60),
            factor: 2.0,
            jitter: JitterPolicy::None,
        };
        assert_eq!(policy.next(100), Duration::from_secs(60));
        assert_eq!(policy.next(u32::MAX), Duration::from_secs(60));
    }
}
