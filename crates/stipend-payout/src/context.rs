//! Collaborators shared by every workflow.
//!
//! A [`PayoutContext`] is built once from configuration and handed to the
//! executors and the orchestrator. Nothing below it reads configuration.

use std::sync::Arc;

use stipend_chain::confirm::{ConfirmPolicy, TransactionConfirmer};
use stipend_chain::rpc::{submit_signed, ChainRpc};
use stipend_chain::tx::LegacyTransaction;
use stipend_chain::ChainParams;
use stipend_crypto::key::SigningKey;
use stipend_ledger::balance::BalanceReader;
use stipend_ledger::session::{RetryPolicy, SessionAuthenticator};
use stipend_ledger::RewardLedger;
use stipend_types::{Address, Transaction};
use tokio::sync::broadcast;

use crate::clock::{Clock, SystemClock};
use crate::Result;

/// Services, chain parameters and policies used by claims and transfers.
pub struct PayoutContext {
    ledger: Arc<dyn RewardLedger>,
    chain: Arc<dyn ChainRpc>,
    params: ChainParams,
    confirm_policy: ConfirmPolicy,
    session_retry: RetryPolicy,
    clock: Arc<dyn Clock>,
    shutdown: Option<broadcast::Sender<()>>,
}

impl PayoutContext {
    /// Context with the wall clock, unbounded confirmation waits and the
    /// default session retry.
    pub fn new(ledger: Arc<dyn RewardLedger>, chain: Arc<dyn ChainRpc>, params: ChainParams) -> Self {
        Self {
            ledger,
            chain,
            params,
            confirm_policy: ConfirmPolicy::unbounded(),
            session_retry: RetryPolicy::default(),
            clock: Arc::new(SystemClock),
            shutdown: None,
        }
    }

    /// Replace the confirmation policy.
    pub fn with_confirm_policy(mut self, policy: ConfirmPolicy) -> Self {
        self.confirm_policy = policy;
        self
    }

    /// Replace the session retry policy.
    pub fn with_session_retry(mut self, retry: RetryPolicy) -> Self {
        self.session_retry = retry;
        self
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Abort confirmation waits when `shutdown` fires.
    pub fn with_shutdown(mut self, shutdown: broadcast::Sender<()>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Chain parameters.
    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Confirmation policy.
    pub fn confirm_policy(&self) -> &ConfirmPolicy {
        &self.confirm_policy
    }

    /// Current unix time.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Reward service client.
    pub fn ledger(&self) -> &Arc<dyn RewardLedger> {
        &self.ledger
    }

    /// Balance reader over the reward service.
    pub fn balance_reader(&self) -> BalanceReader {
        BalanceReader::new(self.ledger.clone())
    }

    /// Session authenticator over the reward service.
    pub fn authenticator(&self) -> SessionAuthenticator {
        SessionAuthenticator::new(self.ledger.clone(), self.session_retry)
    }

    /// Sign a contract call from `key` to the token contract, submit it at
    /// the account's current nonce and wait for its final status.
    ///
    /// The returned transaction is settled: confirmed or reverted.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::SubmissionFailure`](crate::PayoutError::SubmissionFailure)
    ///   if the nonce lookup or submission fails
    /// - [`PayoutError::Signing`](crate::PayoutError::Signing) if signing fails
    /// - [`PayoutError::ConfirmationAborted`](crate::PayoutError::ConfirmationAborted)
    ///   if the confirmation policy or shutdown ends the wait
    pub(crate) async fn send_contract_call(
        &self,
        key: &SigningKey,
        gas_limit: u64,
        data: Vec<u8>,
    ) -> Result<Transaction> {
        let from: Address = key.address();
        let nonce = self.chain.transaction_count(&from).await?;
        let signed = LegacyTransaction {
            nonce,
            gas_price: self.params.gas_price,
            gas_limit,
            to: self.params.token_contract,
            value: 0,
            data,
            chain_id: self.params.chain_id,
        }
        .sign(key)?;

        let hash = submit_signed(self.chain.as_ref(), &signed).await?;
        tracing::info!(%from, %hash, nonce, "transaction submitted");

        let mut transaction = Transaction::pending(hash);
        let confirmer = TransactionConfirmer::new(self.chain.clone(), self.confirm_policy);
        let status = match &self.shutdown {
            Some(sender) => {
                let mut rx = sender.subscribe();
                confirmer.await_confirmation_or_shutdown(hash, &mut rx).await?
            }
            None => confirmer.await_confirmation(hash).await?,
        };
        transaction.settle(status);
        Ok(transaction)
    }
}
