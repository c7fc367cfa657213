//! Balance reads against the reward service.
//!
//! Every read is a fresh round-trip; nothing is cached. The service has
//! one known quirk that is normalised here rather than reported: the
//! lifetime total may be absent or below the claimed balance, in which case
//! the unclaimed amount is taken to be zero. Any other missing or malformed
//! field is [`LedgerError::Unavailable`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stipend_types::{Address, Balance};

use crate::{BalanceInfo, LedgerError, Result, RewardLedger};

/// Balances and last claim time taken from a single response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    /// Claimed / unclaimed balances.
    pub balance: Balance,
    /// Unix time of the last claim.
    pub last_claim: u64,
}

/// Reads balances and claim times from the reward service.
#[derive(Clone)]
pub struct BalanceReader {
    ledger: Arc<dyn RewardLedger>,
}

impl BalanceReader {
    /// Create a reader over `ledger`.
    pub fn new(ledger: Arc<dyn RewardLedger>) -> Self {
        Self { ledger }
    }

    /// Claimed and unclaimed balance of `address`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unavailable`] if the service is unreachable or the
    ///   record lacks its on-chain section
    pub async fn read_balance(&self, address: &Address) -> Result<Balance> {
        let info = self.ledger.balance_info(address).await?;
        normalize_balance(address, &info)
    }

    /// Unix time of the last claim of `address`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unavailable`] if the service is unreachable or the
    ///   timestamp is missing or negative
    pub async fn read_last_claim(&self, address: &Address) -> Result<u64> {
        let info = self.ledger.balance_info(address).await?;
        normalize_last_claim(address, &info)
    }

    /// Balances and last claim time from one response.
    ///
    /// # Errors
    ///
    /// As for [`read_balance`](Self::read_balance) and
    /// [`read_last_claim`](Self::read_last_claim).
    pub async fn read_snapshot(&self, address: &Address) -> Result<LedgerSnapshot> {
        let info = self.ledger.balance_info(address).await?;
        Ok(LedgerSnapshot {
            balance: normalize_balance(address, &info)?,
            last_claim: normalize_last_claim(address, &info)?,
        })
    }
}

/// Turn a raw record into a [`Balance`].
///
/// # Errors
///
/// - [`LedgerError::Unavailable`] if `blockchain_related` is missing or the
///   claimed balance is negative
pub fn normalize_balance(address: &Address, info: &BalanceInfo) -> Result<Balance> {
    let chain = info.chain.as_ref().ok_or_else(|| {
        LedgerError::Unavailable(format!("no on-chain record for {address}"))
    })?;

    // `null` is how the service reports an address that never claimed.
    let claimed = chain.balance.unwrap_or(0);
    let claimed = u64::try_from(claimed).map_err(|_| {
        LedgerError::Unavailable(format!("negative claimed balance {claimed} for {address}"))
    })?;

    let unclaimed = match info.total {
        None => {
            tracing::debug!(%address, "ledger omitted total, unclaimed taken as zero");
            0
        }
        Some(total) => {
            let diff = i128::from(total) - i128::from(claimed);
            if diff < 0 {
                tracing::warn!(
                    %address,
                    total,
                    claimed,
                    "ledger total below claimed balance, unclaimed taken as zero"
                );
                0
            } else {
                u64::try_from(diff).unwrap_or(u64::MAX)
            }
        }
    };

    Ok(Balance { claimed, unclaimed })
}

/// Extract the last claim time.
///
/// # Errors
///
/// - [`LedgerError::Unavailable`] if the timestamp is missing or negative
pub fn normalize_last_claim(address: &Address, info: &BalanceInfo) -> Result<u64> {
    let ts = info.last_claimed_at.ok_or_else(|| {
        LedgerError::Unavailable(format!("no last claim time for {address}"))
    })?;
    u64::try_from(ts)
        .map_err(|_| LedgerError::Unavailable(format!("negative last claim time {ts} for {address}")))
}
