//! On-chain reward claims.
//!
//! A claim moves an account's unclaimed rewards into its on-chain balance:
//! the reward service signs `(owner, amount, timestamp)` and the account
//! submits that signature to the token contract's `checkpoint` function.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stipend_chain::calls;
use stipend_types::{Transaction, TxStatus};

use crate::context::PayoutContext;
use crate::eligibility::can_claim;
use crate::registry::Account;
use crate::{PayoutError, Result};

/// Successful outcome of a claim.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimOutcome {
    /// The checkpoint transaction was confirmed.
    Claimed {
        /// The confirmed claim transaction.
        transaction: Transaction,
        /// Amount the reward service authorized.
        amount: u64,
    },
    /// The reward service had nothing to authorize.
    NothingToClaim,
}

/// Claims rewards for one account at a time.
#[derive(Clone)]
pub struct ClaimExecutor {
    ctx: Arc<PayoutContext>,
}

impl ClaimExecutor {
    /// Create an executor over `ctx`.
    pub fn new(ctx: Arc<PayoutContext>) -> Self {
        Self { ctx }
    }

    /// Claim the account's unclaimed rewards and wait for the claim to be
    /// final.
    ///
    /// The last claim time is always read fresh; eligibility is never
    /// decided on a cached value.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::LedgerUnavailable`] if the last claim time, the
    ///   session or the authorization cannot be obtained
    /// - [`PayoutError::CooldownNotElapsed`] inside the 14-day window
    /// - [`PayoutError::SubmissionFailure`] if the checkpoint transaction
    ///   is not accepted
    /// - [`PayoutError::TransactionReverted`] if the chain rejects it
    /// - [`PayoutError::ConfirmationAborted`] if waiting is cut short
    pub async fn claim(&self, account: &Account) -> Result<ClaimOutcome> {
        let address = account.address();

        let last_claim = self.ctx.balance_reader().read_last_claim(&address).await?;
        let eligibility = can_claim(last_claim, self.ctx.now());
        if !eligibility.eligible {
            tracing::info!(
                account = account.name(),
                %address,
                remaining = %eligibility.remaining,
                "claim cooldown not elapsed"
            );
            return Err(PayoutError::CooldownNotElapsed {
                remaining: eligibility.remaining,
            });
        }

        let token = self
            .ctx
            .authenticator()
            .authenticate(account.signing_key())
            .await?;
        let Some(authorization) = self.ctx.ledger().request_claim(&token).await? else {
            tracing::info!(account = account.name(), %address, "nothing to claim");
            return Ok(ClaimOutcome::NothingToClaim);
        };

        let data = calls::encode_checkpoint(
            &address,
            authorization.amount,
            authorization.timestamp,
            &authorization.signature,
        );
        let gas_limit = self.ctx.params().claim_gas_limit;
        let transaction = self
            .ctx
            .send_contract_call(account.signing_key(), gas_limit, data)
            .await?;

        if transaction.status == TxStatus::Reverted {
            tracing::warn!(account = account.name(), hash = %transaction.hash, "claim reverted");
            return Err(PayoutError::TransactionReverted {
                hash: transaction.hash,
            });
        }

        tracing::info!(
            account = account.name(),
            %address,
            amount = authorization.amount,
            hash = %transaction.hash,
            "claim confirmed"
        );
        Ok(ClaimOutcome::Claimed {
            transaction,
            amount: authorization.amount,
        })
    }
}
