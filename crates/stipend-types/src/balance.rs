//! Reward ledger balances.

use serde::{Deserialize, Serialize};

/// Reward balances of one address, in the token's smallest unit.
///
/// `unclaimed` is already normalised: the ledger occasionally reports a
/// total below the claimed balance, which is surfaced here as zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Tokens already moved on-chain and spendable.
    pub claimed: u64,
    /// Tokens earned but not yet claimed.
    pub unclaimed: u64,
}

impl Balance {
    /// Claimed plus unclaimed.
    pub fn total(&self) -> u64 {
        self.claimed.saturating_add(self.unclaimed)
    }
}
