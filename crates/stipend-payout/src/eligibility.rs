//! Claim cooldown.
//!
//! An address may claim once every [`CLAIM_COOLDOWN_SECS`] (14 days). The
//! check is pure: callers pass the last claim time they just read and the
//! current time. When the last claim time could not be read, use
//! [`Eligibility::unknown`], which never permits a claim.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stipend_types::CLAIM_COOLDOWN_SECS;

/// Time left until the next legal claim, split for display.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainingTime {
    /// Whole days.
    pub days: u64,
    /// Hours past `days` (0..24).
    pub hours: u64,
    /// Minutes past `hours` (0..60).
    pub minutes: u64,
    /// Seconds past `minutes` (0..60).
    pub seconds: u64,
    /// The whole interval in seconds.
    pub total_secs: u64,
}

impl RemainingTime {
    /// Decompose `total_secs`.
    pub fn from_secs(total_secs: u64) -> Self {
        Self {
            days: total_secs / 86_400,
            hours: total_secs % 86_400 / 3_600,
            minutes: total_secs % 3_600 / 60,
            seconds: total_secs % 60,
            total_secs,
        }
    }

    /// Whether nothing remains.
    pub fn is_zero(&self) -> bool {
        self.total_secs == 0
    }

    /// As a [`Duration`].
    pub fn as_duration(&self) -> Duration {
        Duration::from_secs(self.total_secs)
    }
}

impl fmt::Display for RemainingTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {}h {}m {}s",
            self.days, self.hours, self.minutes, self.seconds
        )
    }
}

/// Outcome of a cooldown check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Eligibility {
    /// Whether a claim may proceed now.
    pub eligible: bool,
    /// Time left until the next legal claim; zero when eligible.
    pub remaining: RemainingTime,
    /// Last claim time the decision was based on. `None` if it could not
    /// be read.
    pub last_claim: Option<u64>,
    /// Earliest unix time at which a claim is legal, when known.
    pub next_claim_at: Option<u64>,
}

impl Eligibility {
    /// Not eligible because the last claim time is unknown.
    pub fn unknown() -> Self {
        Self {
            eligible: false,
            remaining: RemainingTime::default(),
            last_claim: None,
            next_claim_at: None,
        }
    }
}

/// Decide whether an address that last claimed at `last_claim` may claim
/// at `now`. Both are unix seconds.
///
/// Eligible iff `now >= last_claim + 14 days`; the exact boundary is
/// eligible.
pub fn can_claim(last_claim: u64, now: u64) -> Eligibility {
    let next_claim_at = last_claim.saturating_add(CLAIM_COOLDOWN_SECS);
    let eligible = now >= next_claim_at;
    let remaining = if eligible {
        RemainingTime::default()
    } else {
        RemainingTime::from_secs(next_claim_at - now)
    };
    Eligibility {
        eligible,
        remaining,
        last_claim: Some(last_claim),
        next_claim_at: Some(next_claim_at),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    const NOW: u64 = 1_700_000_000;
    const DAY: u64 = 86_400;

    #[test]
    fn test_exact_boundary_is_eligible() {
        let e = can_claim(NOW - CLAIM_COOLDOWN_SECS, NOW);
        assert!(e.eligible);
        assert!(e.remaining.is_zero());
        assert_eq!(e.next_claim_at, Some(NOW));
    }

    #[test]
    fn test_one_second_early() {
        let e = can_claim(NOW - CLAIM_COOLDOWN_SECS + 1, NOW);
        assert!(!e.eligible);
        assert_eq!(e.remaining, RemainingTime::from_secs(1));
    }

    #[test]
    fn test_remaining_decomposition() {
        // Claimed 3 days, 2 hours, 5 minutes and 7 seconds ago.
        let ago = 3 * DAY + 2 * 3_600 + 5 * 60 + 7;
        let e = can_claim(NOW - ago, NOW);
        assert!(!e.eligible);
        let left = CLAIM_COOLDOWN_SECS - ago;
        assert_eq!(e.remaining.total_secs, left);
        assert_eq!(e.remaining.days, 10);
        assert_eq!(e.remaining.hours, 21);
        assert_eq!(e.remaining.minutes, 54);
        assert_eq!(e.remaining.seconds, 53);
        assert_eq!(e.remaining.to_string(), "10d 21h 54m 53s");
    }

    #[test]
    fn test_unknown_fails_closed() {
        let e = Eligibility::unknown();
        assert!(!e.eligible);
        assert_eq!(e.last_claim, None);
    }

    #[test]
    fn test_never_claimed_is_eligible() {
        assert!(can_claim(0, NOW).eligible);
    }

    #[test]
    fn test_last_claim_in_future_is_not_eligible() {
        let e = can_claim(NOW + 10, NOW);
        assert!(!e.eligible);
        assert_eq!(e.remaining.total_secs, CLAIM_COOLDOWN_SECS + 10);
    }

    proptest! {
        #[test]
        fn eligible_iff_cooldown_elapsed(last in 0u64..4_000_000_000, elapsed in 0u64..(60 * DAY)) {
            let now = last + elapsed;
            let e = can_claim(last, now);
            prop_assert_eq!(e.eligible, elapsed >= CLAIM_COOLDOWN_SECS);
            if e.eligible {
                prop_assert!(e.remaining.is_zero());
            } else {
                prop_assert_eq!(e.remaining.total_secs, CLAIM_COOLDOWN_SECS - elapsed);
            }
        }

        #[test]
        fn check_is_repeatable(last in 0u64..4_000_000_000, now in 0u64..4_000_000_000) {
            prop_assert_eq!(can_claim(last, now), can_claim(last, now));
        }

        #[test]
        fn decomposition_sums_back(total in 0u64..10_000_000) {
            let r = RemainingTime::from_secs(total);
            prop_assert_eq!(r.days * DAY + r.hours * 3_600 + r.minutes * 60 + r.seconds, total);
            prop_assert!(r.hours < 24 && r.minutes < 60 && r.seconds < 60);
        }
    }
}
