//! Delay schedules for polling and bounded retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Delay schedule: `initial`, then multiplied by `factor` per step, capped
/// at `max`. A factor of `1.0` gives a fixed interval.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Backoff {
    /// First delay.
    pub initial: Duration,
    /// Growth factor applied after each step.
    pub factor: f64,
    /// Upper bound for any single delay.
    pub max: Duration,
}

impl Backoff {
    /// A fixed delay between attempts.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            initial: interval,
            factor: 1.0,
            max: interval,
        }
    }

    /// Exponential growth from `initial` up to `max`.
    pub fn exponential(initial: Duration, factor: f64, max: Duration) -> Self {
        Self {
            initial,
            factor,
            max,
        }
    }

    /// Delay to wait after the `attempt`-th failed attempt (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = if self.factor.is_finite() && self.factor >= 1.0 {
            self.factor
        } else {
            1.0
        };
        let scaled = self.initial.as_secs_f64() * factor.powi(attempt.min(64) as i32);
        let capped = scaled.min(self.max.as_secs_f64().max(self.initial.as_secs_f64()));
        Duration::from_secs_f64(capped)
    }
}
