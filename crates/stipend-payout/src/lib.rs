//! # stipend-payout
//!
//! Claim-and-payout engine for scholarship accounts.
//!
//! Decides when a reward claim is legal, submits the claim and the split
//! transfers as signed Ronin transactions, and reports the final outcome of
//! every leg.
//!
//! ## Modules
//!
//! - [`registry`] - Immutable account resolution and payout ratios
//! - [`eligibility`] - 14-day claim cooldown
//! - [`splits`] - Custodian / account holder split with conservation
//! - [`clock`] - Time source
//! - [`context`] - Collaborators shared by every workflow
//! - [`claim`] - On-chain claim of unclaimed rewards
//! - [`transfer`] - Token transfers
//! - [`orchestrator`] - Claim, split and distribute

pub mod claim;
pub mod clock;
pub mod context;
pub mod eligibility;
pub mod orchestrator;
pub mod registry;
pub mod splits;
pub mod transfer;

pub use claim::{ClaimExecutor, ClaimOutcome};
pub use context::PayoutContext;
pub use eligibility::{can_claim, Eligibility, RemainingTime};
pub use orchestrator::{PayoutOrchestrator, PayoutResult};
pub use registry::{Account, AccountRegistry, AccountSpec, PayoutRatio};
pub use splits::{compute_split, PayoutSplit};
pub use transfer::{TransferExecutor, TransferRequest};

use serde::{Deserialize, Serialize};
use stipend_chain::confirm::AbortReason;
use stipend_chain::ChainError;
use stipend_ledger::LedgerError;
use stipend_types::TxHash;

/// Error types for claim and payout operations.
#[derive(Debug, thiserror::Error)]
pub enum PayoutError {
    /// The reward service was unreachable or answered with malformed data.
    #[error("reward ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// A claim was attempted inside the cooldown window.
    #[error("claim cooldown not elapsed: {remaining} remaining")]
    CooldownNotElapsed {
        /// Time left until the next legal claim.
        remaining: RemainingTime,
    },

    /// Transfer amount or recipient rejected before submission.
    #[error("invalid transfer request: {0}")]
    InvalidTransferRequest(String),

    /// The chain executed the transaction and rejected it.
    #[error("transaction {hash} reverted")]
    TransactionReverted {
        /// Hash of the reverted transaction.
        hash: TxHash,
    },

    /// The transaction could not be submitted. No nonce was consumed.
    #[error("submission failed: {0}")]
    SubmissionFailure(String),

    /// The transaction was submitted but waiting for its receipt stopped.
    #[error("confirmation of {hash} aborted: {reason}")]
    ConfirmationAborted {
        /// Hash of the submitted transaction.
        hash: TxHash,
        /// Why the wait stopped.
        reason: AbortReason,
    },

    /// Signing a transaction or login challenge failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Account configuration could not be resolved.
    #[error("invalid account: {0}")]
    InvalidAccount(String),
}

/// Convenience result type for claim and payout operations.
pub type Result<T> = std::result::Result<T, PayoutError>;

/// Flat classification of [`PayoutError`] for structured reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`PayoutError::LedgerUnavailable`].
    LedgerUnavailable,
    /// See [`PayoutError::CooldownNotElapsed`].
    CooldownNotElapsed,
    /// See [`PayoutError::InvalidTransferRequest`].
    InvalidTransferRequest,
    /// See [`PayoutError::TransactionReverted`].
    TransactionReverted,
    /// See [`PayoutError::SubmissionFailure`].
    SubmissionFailure,
    /// See [`PayoutError::ConfirmationAborted`].
    ConfirmationAborted,
    /// See [`PayoutError::Signing`].
    Signing,
    /// See [`PayoutError::InvalidAccount`].
    InvalidAccount,
}

impl PayoutError {
    /// Classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PayoutError::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
            PayoutError::CooldownNotElapsed { .. } => ErrorKind::CooldownNotElapsed,
            PayoutError::InvalidTransferRequest(_) => ErrorKind::InvalidTransferRequest,
            PayoutError::TransactionReverted { .. } => ErrorKind::TransactionReverted,
            PayoutError::SubmissionFailure(_) => ErrorKind::SubmissionFailure,
            PayoutError::ConfirmationAborted { .. } => ErrorKind::ConfirmationAborted,
            PayoutError::Signing(_) => ErrorKind::Signing,
            PayoutError::InvalidAccount(_) => ErrorKind::InvalidAccount,
        }
    }

    /// Transaction involved, if the error happened after submission.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            PayoutError::TransactionReverted { hash }
            | PayoutError::ConfirmationAborted { hash, .. } => Some(*hash),
            _ => None,
        }
    }
}

impl From<LedgerError> for PayoutError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Signing(inner) => PayoutError::Signing(inner.to_string()),
            other => PayoutError::LedgerUnavailable(other.to_string()),
        }
    }
}

impl From<ChainError> for PayoutError {
    fn from(e: ChainError) -> Self {
        match e {
            ChainError::Signing(inner) => PayoutError::Signing(inner.to_string()),
            ChainError::ConfirmationAborted { hash, reason } => {
                PayoutError::ConfirmationAborted { hash, reason }
            }
            other => PayoutError::SubmissionFailure(other.to_string()),
        }
    }
}

impl From<stipend_crypto::CryptoError> for PayoutError {
    fn from(e: stipend_crypto::CryptoError) -> Self {
        PayoutError::Signing(e.to_string())
    }
}
