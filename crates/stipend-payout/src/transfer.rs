//! Token transfers.
//!
//! Requests are validated before any network call: a zero amount or the
//! zero address never reaches the chain.

use std::sync::Arc;

use serde::Serialize;
use stipend_chain::calls;
use stipend_types::{Address, Transaction, TxStatus};

use crate::context::PayoutContext;
use crate::registry::Account;
use crate::{PayoutError, Result};

/// A validated transfer: a non-zero amount to a non-zero address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TransferRequest {
    to: Address,
    amount: u64,
}

impl TransferRequest {
    /// Validate a typed request.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidTransferRequest`] if `amount` is zero or `to`
    ///   is the zero address
    pub fn new(to: Address, amount: u64) -> Result<Self> {
        if amount < 1 {
            return Err(PayoutError::InvalidTransferRequest(
                "amount must be at least 1".to_string(),
            ));
        }
        if to.is_zero() {
            return Err(PayoutError::InvalidTransferRequest(
                "recipient is the zero address".to_string(),
            ));
        }
        Ok(Self { to, amount })
    }

    /// Validate an untyped request, as received from a command line or chat
    /// command.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidTransferRequest`] if `amount < 1` or `to` is
    ///   not a valid address
    pub fn parse(to: &str, amount: i64) -> Result<Self> {
        let amount = u64::try_from(amount).map_err(|_| {
            PayoutError::InvalidTransferRequest(format!("amount {amount} is negative"))
        })?;
        let to: Address = to.trim().parse().map_err(|e| {
            PayoutError::InvalidTransferRequest(format!("recipient {to:?}: {e}"))
        })?;
        Self::new(to, amount)
    }

    /// Recipient.
    pub fn to(&self) -> Address {
        self.to
    }

    /// Amount in the token's smallest unit.
    pub fn amount(&self) -> u64 {
        self.amount
    }
}

/// Sends tokens from an account.
#[derive(Clone)]
pub struct TransferExecutor {
    ctx: Arc<PayoutContext>,
}

impl TransferExecutor {
    /// Create an executor over `ctx`.
    pub fn new(ctx: Arc<PayoutContext>) -> Self {
        Self { ctx }
    }

    /// Send `amount` tokens from `account` to `to` and wait for the transfer
    /// to be final.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidTransferRequest`] before any network call if
    ///   the request is invalid
    /// - as for [`execute`](Self::execute)
    pub async fn transfer(&self, account: &Account, to: Address, amount: u64) -> Result<Transaction> {
        let request = TransferRequest::new(to, amount)?;
        self.execute(account, request).await
    }

    /// Send a validated request.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::SubmissionFailure`] if the transfer is not accepted
    /// - [`PayoutError::TransactionReverted`] if the chain rejects it
    /// - [`PayoutError::ConfirmationAborted`] if waiting is cut short
    pub async fn execute(&self, account: &Account, request: TransferRequest) -> Result<Transaction> {
        let data = calls::encode_transfer(&request.to, request.amount);
        let gas_limit = self.ctx.params().transfer_gas_limit;
        let transaction = self
            .ctx
            .send_contract_call(account.signing_key(), gas_limit, data)
            .await?;

        if transaction.status == TxStatus::Reverted {
            tracing::warn!(
                account = account.name(),
                to = %request.to,
                amount = request.amount,
                hash = %transaction.hash,
                "transfer reverted"
            );
            return Err(PayoutError::TransactionReverted {
                hash: transaction.hash,
            });
        }

        tracing::info!(
            account = account.name(),
            to = %request.to,
            amount = request.amount,
            hash = %transaction.hash,
            "transfer confirmed"
        );
        Ok(transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero_amount() {
        let to = Address::from_bytes([1; 20]);
        assert!(matches!(
            TransferRequest::new(to, 0),
            Err(PayoutError::InvalidTransferRequest(_))
        ));
    }

    #[test]
    fn test_rejects_zero_address() {
        assert!(matches!(
            TransferRequest::new(Address::zero(), 10),
            Err(PayoutError::InvalidTransferRequest(_))
        ));
    }

    #[test]
    fn test_parse() {
        let req = TransferRequest::parse("ronin:1111111111111111111111111111111111111111", 25)
            .expect("valid");
        assert_eq!(req.amount(), 25);
        assert_eq!(req.to(), Address::from_bytes([0x11; 20]));

        for amount in [0, -1, i64::MIN] {
            assert!(matches!(
                TransferRequest::parse("0x1111111111111111111111111111111111111111", amount),
                Err(PayoutError::InvalidTransferRequest(_))
            ));
        }
        assert!(matches!(
            TransferRequest::parse("0x1234", 5),
            Err(PayoutError::InvalidTransferRequest(_))
        ));
    }
}
