//! Claim, split and distribute.
//!
//! One payout runs `claim -> read balance -> split -> custodian leg ->
//! holder leg` for a single account. The custodian leg is always attempted
//! first. A failed step does not stop the ones after it; every failure is
//! recorded in the [`PayoutResult`] together with the stage it happened
//! in. An empty claim and an unreadable balance are the only early exits.
//!
//! Payouts for different accounts are independent and may run
//! concurrently. Two payouts for the same account must not overlap: they
//! would race for the same nonce. Callers serialize per account.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stipend_ledger::balance::LedgerSnapshot;
use stipend_types::{Address, Transaction};

use crate::claim::{ClaimExecutor, ClaimOutcome};
use crate::context::PayoutContext;
use crate::eligibility::{can_claim, Eligibility, RemainingTime};
use crate::registry::{Account, AccountRegistry, PayoutRatio};
use crate::splits::{compute_split, PayoutSplit};
use crate::transfer::{TransferExecutor, TransferRequest};
use crate::{ErrorKind, PayoutError, Result};

/// Step of a workflow an error belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Claiming rewards.
    Claim,
    /// Re-reading the claimed balance after the claim.
    ReadBalance,
    /// Sending the custodian share.
    CustodianTransfer,
    /// Sending the account holder share.
    HolderTransfer,
}

/// How a claimed balance is divided.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Distribution {
    /// Custodian and account holder shares per the payout ratio.
    Split,
    /// Everything to the custodian.
    Sweep,
}

/// One recorded failure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageError {
    /// Where it happened.
    pub stage: Stage,
    /// What kind of failure.
    pub kind: ErrorKind,
    /// Human readable description.
    pub message: String,
    /// Transaction involved, if it had been submitted.
    pub hash: Option<stipend_types::TxHash>,
}

impl StageError {
    fn new(stage: Stage, error: &PayoutError) -> Self {
        Self {
            stage,
            kind: error.kind(),
            message: error.to_string(),
            hash: error.tx_hash(),
        }
    }
}

/// What happened at the claim step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClaimReport {
    /// Claim confirmed.
    Claimed {
        /// The claim transaction.
        transaction: Transaction,
        /// Amount claimed.
        amount: u64,
    },
    /// Nothing was claimable.
    NothingToClaim,
    /// The cooldown has not elapsed. Expected, not a failure.
    Cooldown {
        /// Time until the next legal claim.
        remaining: RemainingTime,
    },
    /// The claim failed; see the recorded errors. Tokens claimed earlier are
    /// still distributed.
    Failed,
}

impl From<ClaimOutcome> for ClaimReport {
    fn from(outcome: ClaimOutcome) -> Self {
        match outcome {
            ClaimOutcome::Claimed {
                transaction,
                amount,
            } => ClaimReport::Claimed {
                transaction,
                amount,
            },
            ClaimOutcome::NothingToClaim => ClaimReport::NothingToClaim,
        }
    }
}

/// Outcome of one transfer leg.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum LegOutcome {
    /// The workflow ended before this leg.
    NotAttempted,
    /// The leg's share is zero.
    NothingToSend,
    /// Transfer confirmed.
    Sent {
        /// The transfer transaction.
        transaction: Transaction,
    },
    /// Transfer failed; see the recorded errors.
    Failed,
}

/// One transfer leg of a payout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leg {
    /// Recipient, if known.
    pub to: Option<Address>,
    /// Amount to send.
    pub amount: u64,
    /// What happened.
    #[serde(flatten)]
    pub outcome: LegOutcome,
}

impl Leg {
    fn not_attempted() -> Self {
        Self {
            to: None,
            amount: 0,
            outcome: LegOutcome::NotAttempted,
        }
    }

    fn nothing_to_send(to: Option<Address>) -> Self {
        Self {
            to,
            amount: 0,
            outcome: LegOutcome::NothingToSend,
        }
    }

    /// The confirmed transaction, if this leg sent one.
    pub fn transaction(&self) -> Option<&Transaction> {
        match &self.outcome {
            LegOutcome::Sent { transaction } => Some(transaction),
            _ => None,
        }
    }
}

/// Result of one account's payout. Partial success is visible per leg.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutResult {
    /// Account display name.
    pub account: String,
    /// Account address.
    pub address: Address,
    /// Claim step.
    pub claim: ClaimReport,
    /// Claimed balance read after the claim.
    pub claimed_balance: Option<u64>,
    /// Amounts, when a split was computed.
    pub split: Option<PayoutSplit>,
    /// Custodian share.
    pub custodian_leg: Leg,
    /// Account holder share.
    pub holder_leg: Leg,
    /// Failures in the order they happened.
    pub errors: Vec<StageError>,
}

impl PayoutResult {
    fn new(account: &Account) -> Self {
        Self {
            account: account.name().to_string(),
            address: account.address(),
            claim: ClaimReport::Failed,
            claimed_balance: None,
            split: None,
            custodian_leg: Leg::not_attempted(),
            holder_leg: Leg::not_attempted(),
            errors: Vec::new(),
        }
    }

    fn record(&mut self, stage: Stage, error: &PayoutError) {
        tracing::warn!(account = %self.account, ?stage, error = %error, "payout step failed");
        self.errors.push(StageError::new(stage, error));
    }

    /// Whether any step failed.
    pub fn is_failed(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Confirmed transfer transactions, custodian leg first.
    pub fn transfers(&self) -> Vec<Transaction> {
        [self.custodian_leg.transaction(), self.holder_leg.transaction()]
            .into_iter()
            .flatten()
            .copied()
            .collect()
    }
}

/// Result of a claim without distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimResult {
    /// Account display name.
    pub account: String,
    /// Account address.
    pub address: Address,
    /// Claim step.
    pub claim: ClaimReport,
    /// Failure, if the claim failed.
    pub error: Option<StageError>,
}

/// Balances and cooldown state of one account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountStatus {
    /// Account display name.
    pub account: String,
    /// Account address.
    pub address: Address,
    /// Tokens already claimed.
    pub claimed: u64,
    /// Tokens earned but not yet claimed.
    pub unclaimed: u64,
    /// Claimed plus unclaimed.
    pub total: u64,
    /// Cooldown state at the time of the read.
    pub eligibility: Eligibility,
}

/// Top-level claim and payout workflows.
#[derive(Clone)]
pub struct PayoutOrchestrator {
    ctx: Arc<PayoutContext>,
    registry: Arc<AccountRegistry>,
    claims: ClaimExecutor,
    transfers: TransferExecutor,
}

impl PayoutOrchestrator {
    /// Create an orchestrator for the accounts in `registry`.
    pub fn new(ctx: Arc<PayoutContext>, registry: Arc<AccountRegistry>) -> Self {
        Self {
            claims: ClaimExecutor::new(ctx.clone()),
            transfers: TransferExecutor::new(ctx.clone()),
            ctx,
            registry,
        }
    }

    /// Registered accounts.
    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    /// Claim, then split the claimed balance between custodian and account
    /// holder. Never fails as a whole; see [`PayoutResult::errors`].
    ///
    /// Only an empty claim ends the run early. A cooldown or a failed claim
    /// is reported and the balance already claimed on-chain is still
    /// distributed.
    pub async fn payout(&self, account: &Account) -> PayoutResult {
        self.run(account, Distribution::Split).await
    }

    /// Claim, then send the whole claimed balance to the custodian with no
    /// account holder share.
    pub async fn sweep(&self, account: &Account) -> PayoutResult {
        self.run(account, Distribution::Sweep).await
    }

    async fn run(&self, account: &Account, distribution: Distribution) -> PayoutResult {
        let mut result = PayoutResult::new(account);

        match self.claims.claim(account).await {
            Ok(ClaimOutcome::NothingToClaim) => {
                result.claim = ClaimReport::NothingToClaim;
                return result;
            }
            Ok(outcome) => result.claim = outcome.into(),
            Err(PayoutError::CooldownNotElapsed { remaining }) => {
                result.claim = ClaimReport::Cooldown { remaining };
            }
            Err(e) => result.record(Stage::Claim, &e),
        }

        let balance = match self.ctx.balance_reader().read_balance(&account.address()).await {
            Ok(balance) => balance.claimed,
            Err(e) => {
                result.record(Stage::ReadBalance, &e.into());
                return result;
            }
        };
        result.claimed_balance = Some(balance);

        let ratio = match distribution {
            Distribution::Split => account.payout_ratio(),
            Distribution::Sweep => PayoutRatio::ZERO,
        };
        if balance < 1 {
            tracing::info!(account = account.name(), "claimed balance is empty, nothing to send");
            result.custodian_leg = Leg::nothing_to_send(Some(account.custodian()));
            result.holder_leg = Leg::nothing_to_send(account.holder_address());
            return result;
        }

        let split = compute_split(balance, ratio);
        result.split = Some(split);
        tracing::info!(
            account = account.name(),
            balance,
            ?distribution,
            custodian_amount = split.custodian_amount,
            holder_amount = split.holder_amount,
            "payout split computed"
        );

        result.custodian_leg = self
            .run_leg(
                &mut result.errors,
                account,
                Stage::CustodianTransfer,
                Some(account.custodian()),
                split.custodian_amount,
            )
            .await;

        result.holder_leg = if ratio.is_zero() {
            Leg::nothing_to_send(None)
        } else {
            self.run_leg(
                &mut result.errors,
                account,
                Stage::HolderTransfer,
                account.holder_address(),
                split.holder_amount,
            )
            .await
        };

        result
    }

    async fn run_leg(
        &self,
        errors: &mut Vec<StageError>,
        account: &Account,
        stage: Stage,
        to: Option<Address>,
        amount: u64,
    ) -> Leg {
        if amount == 0 {
            return Leg::nothing_to_send(to);
        }
        let outcome = match to {
            Some(recipient) => self.transfers.transfer(account, recipient, amount).await,
            None => Err(PayoutError::InvalidTransferRequest(
                "no recipient configured".to_string(),
            )),
        };
        let outcome = match outcome {
            Ok(transaction) => LegOutcome::Sent { transaction },
            Err(e) => {
                tracing::warn!(account = account.name(), ?stage, error = %e, "transfer leg failed");
                errors.push(StageError::new(stage, &e));
                LegOutcome::Failed
            }
        };
        Leg { to, amount, outcome }
    }

    /// [`payout`](Self::payout) every registered account in order. One
    /// account's failure does not affect the others.
    pub async fn payout_all(&self) -> Vec<PayoutResult> {
        let mut results = Vec::with_capacity(self.registry.accounts().len());
        for account in self.registry.accounts() {
            results.push(self.payout(account).await);
        }
        let failed = results.iter().filter(|r| r.is_failed()).count();
        tracing::info!(accounts = results.len(), failed, "payout run finished");
        results
    }

    /// Cooldown state of `account`, from a fresh read. Fails closed: if the
    /// last claim time cannot be read the account is not eligible.
    pub async fn can_claim(&self, account: &Account) -> Eligibility {
        match self
            .ctx
            .balance_reader()
            .read_last_claim(&account.address())
            .await
        {
            Ok(last_claim) => can_claim(last_claim, self.ctx.now()),
            Err(e) => {
                tracing::warn!(account = account.name(), error = %e, "last claim time unavailable");
                Eligibility::unknown()
            }
        }
    }

    /// Balances and cooldown state of `account` from a single read.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::LedgerUnavailable`] if the reward service cannot be
    ///   read
    pub async fn status(&self, account: &Account) -> Result<AccountStatus> {
        let LedgerSnapshot {
            balance,
            last_claim,
        } = self
            .ctx
            .balance_reader()
            .read_snapshot(&account.address())
            .await?;
        Ok(AccountStatus {
            account: account.name().to_string(),
            address: account.address(),
            claimed: balance.claimed,
            unclaimed: balance.unclaimed,
            total: balance.total(),
            eligibility: can_claim(last_claim, self.ctx.now()),
        })
    }

    /// Claim without distributing.
    pub async fn claim_only(&self, account: &Account) -> ClaimResult {
        let (claim, error) = match self.claims.claim(account).await {
            Ok(outcome) => (outcome.into(), None),
            Err(PayoutError::CooldownNotElapsed { remaining }) => {
                (ClaimReport::Cooldown { remaining }, None)
            }
            Err(e) => {
                tracing::warn!(account = account.name(), error = %e, "claim failed");
                (ClaimReport::Failed, Some(StageError::new(Stage::Claim, &e)))
            }
        };
        ClaimResult {
            account: account.name().to_string(),
            address: account.address(),
            claim,
            error,
        }
    }

    /// [`claim_only`](Self::claim_only) every registered account in order.
    pub async fn claim_all(&self) -> Vec<ClaimResult> {
        let mut results = Vec::with_capacity(self.registry.accounts().len());
        for account in self.registry.accounts() {
            results.push(self.claim_only(account).await);
        }
        results
    }

    /// Send `amount` tokens from `from` to `to`, where `to` names a
    /// registered account or is an address.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidTransferRequest`] before any network call if
    ///   `amount < 1` or `to` is neither an account nor a valid address
    /// - as for [`TransferExecutor::execute`]
    pub async fn manual_transfer(&self, from: &Account, to: &str, amount: i64) -> Result<Transaction> {
        let recipient = match self.registry.lookup(to) {
            Some(account) => account.address().to_string(),
            None => to.to_string(),
        };
        let request = TransferRequest::parse(&recipient, amount)?;
        tracing::info!(
            account = from.name(),
            to = %request.to(),
            amount = request.amount(),
            "manual transfer requested"
        );
        self.transfers.execute(from, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leg_serializes_flat() {
        let leg = Leg::nothing_to_send(Some(Address::from_bytes([2; 20])));
        let json = serde_json::to_value(leg).expect("serialize");
        assert_eq!(json["outcome"], "nothing_to_send");
        assert_eq!(json["amount"], 0);
        assert_eq!(json["to"], "0x0202020202020202020202020202020202020202");
    }

    #[test]
    fn test_stage_error_carries_hash() {
        let hash = stipend_types::TxHash::from_bytes([9; 32]);
        let err = StageError::new(
            Stage::HolderTransfer,
            &PayoutError::TransactionReverted { hash },
        );
        assert_eq!(err.kind, ErrorKind::TransactionReverted);
        assert_eq!(err.hash, Some(hash));
        let json = serde_json::to_value(&err).expect("serialize");
        assert_eq!(json["stage"], "holder_transfer");
    }

    #[test]
    fn test_claim_report_from_outcome() {
        assert_eq!(
            ClaimReport::from(ClaimOutcome::NothingToClaim),
            ClaimReport::NothingToClaim
        );
    }
}
