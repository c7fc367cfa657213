//! Custodian / account holder split.
//!
//! The account holder receives `ceil(balance * ratio)`, the custodian the
//! remainder, so rounding favours the holder by at most one unit and the
//! two amounts always sum to the balance.

use serde::{Deserialize, Serialize};

use crate::registry::{PayoutRatio, PPM_SCALE};

/// Amounts of one payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutSplit {
    /// Claimed balance the split was computed from.
    pub total: u64,
    /// Sent to the custodian.
    pub custodian_amount: u64,
    /// Sent to the account holder.
    pub holder_amount: u64,
}

/// Split `balance` according to `ratio`.
pub fn compute_split(balance: u64, ratio: PayoutRatio) -> PayoutSplit {
    let scale = u128::from(PPM_SCALE);
    let scaled = u128::from(balance) * u128::from(ratio.ppm());
    // ratio <= 1, so the quotient never exceeds `balance`.
    let holder = u64::try_from(scaled.div_ceil(scale)).unwrap_or(balance).min(balance);
    PayoutSplit {
        total: balance,
        custodian_amount: balance - holder,
        holder_amount: holder,
    }
}
