//! Receipt polling until a transaction is final.
//!
//! A missing receipt means "not mined yet", never failure. By default the
//! confirmer keeps polling every [`DEFAULT_POLL_INTERVAL`] until a receipt
//! appears, however long that takes. [`ConfirmPolicy`] can bound the wait
//! by attempt count and/or wall-clock time, and
//! [`TransactionConfirmer::await_confirmation_or_shutdown`] also stops on a
//! shutdown broadcast. Dropping the returned future cancels the wait.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use stipend_types::{Backoff, TxHash, TxStatus};
use tokio::sync::broadcast;

use crate::rpc::ChainRpc;
use crate::{ChainError, Result, DEFAULT_POLL_INTERVAL};

/// Why a confirmation wait ended without a final status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbortReason {
    /// The configured overall timeout elapsed.
    Timeout,
    /// The configured number of polls was used up.
    AttemptsExhausted,
    /// A shutdown signal was received.
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Timeout => write!(f, "timed out"),
            AbortReason::AttemptsExhausted => write!(f, "poll attempts exhausted"),
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// How long and how often to poll for a receipt.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfirmPolicy {
    /// Delay between polls.
    pub backoff: Backoff,
    /// Stop after this many polls. `None` polls forever.
    pub max_attempts: Option<u32>,
    /// Stop after this much time. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for ConfirmPolicy {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl ConfirmPolicy {
    /// Poll every five seconds until a receipt appears.
    pub fn unbounded() -> Self {
        Self {
            backoff: Backoff::fixed(DEFAULT_POLL_INTERVAL),
            max_attempts: None,
            timeout: None,
        }
    }

    /// Whether this policy can give up before a receipt appears.
    pub fn is_bounded(&self) -> bool {
        self.max_attempts.is_some() || self.timeout.is_some()
    }
}

/// Waits for submitted transactions to become final.
#[derive(Clone)]
pub struct TransactionConfirmer {
    rpc: Arc<dyn ChainRpc>,
    policy: ConfirmPolicy,
}

impl TransactionConfirmer {
    /// Create a confirmer polling `rpc` under `policy`.
    pub fn new(rpc: Arc<dyn ChainRpc>, policy: ConfirmPolicy) -> Self {
        Self { rpc, policy }
    }

    /// The active policy.
    pub fn policy(&self) -> &ConfirmPolicy {
        &self.policy
    }

    /// Wait until `hash` is [`TxStatus::Confirmed`] or [`TxStatus::Reverted`].
    ///
    /// # Errors
    ///
    /// - [`ChainError::ConfirmationAborted`] if the policy's attempt limit or
    ///   timeout is reached first
    pub async fn await_confirmation(&self, hash: TxHash) -> Result<TxStatus> {
        match self.policy.timeout {
            Some(limit) => tokio::time::timeout(limit, self.poll(hash))
                .await
                .map_err(|_| {
                    tracing::warn!(%hash, ?limit, "confirmation wait timed out");
                    ChainError::ConfirmationAborted {
                        hash,
                        reason: AbortReason::Timeout,
                    }
                })?,
            None => self.poll(hash).await,
        }
    }

    /// Like [`await_confirmation`](Self::await_confirmation), but also stops
    /// when `shutdown` fires. A closed channel is ignored.
    ///
    /// # Errors
    ///
    /// - [`ChainError::ConfirmationAborted`] with [`AbortReason::Cancelled`]
    ///   on shutdown, or as for `await_confirmation`
    pub async fn await_confirmation_or_shutdown(
        &self,
        hash: TxHash,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<TxStatus> {
        let cancelled = async {
            loop {
                match shutdown.recv().await {
                    Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => return,
                    Err(broadcast::error::RecvError::Closed) => {
                        std::future::pending::<()>().await;
                    }
                }
            }
        };

        tokio::select! {
            result = self.await_confirmation(hash) => result,
            _ = cancelled => {
                tracing::info!(%hash, "confirmation wait cancelled");
                Err(ChainError::ConfirmationAborted { hash, reason: AbortReason::Cancelled })
            }
        }
    }

    async fn poll(&self, hash: TxHash) -> Result<TxStatus> {
        let mut attempt: u32 = 0;
        loop {
            match self.rpc.transaction_receipt(&hash).await {
                Ok(Some(receipt)) => {
                    let status = if receipt.success {
                        TxStatus::Confirmed
                    } else {
                        TxStatus::Reverted
                    };
                    tracing::info!(%hash, ?status, block = ?receipt.block_number, "transaction final");
                    return Ok(status);
                }
                Ok(None) => tracing::debug!(%hash, attempt, "receipt not found yet"),
                Err(e) => tracing::warn!(%hash, attempt, error = %e, "receipt poll failed"),
            }

            attempt = attempt.saturating_add(1);
            if let Some(max) = self.policy.max_attempts {
                if attempt >= max {
                    tracing::warn!(%hash, attempts = attempt, "giving up on confirmation");
                    return Err(ChainError::ConfirmationAborted {
                        hash,
                        reason: AbortReason::AttemptsExhausted,
                    });
                }
            }
            tokio::time::sleep(self.policy.backoff.delay(attempt - 1)).await;
        }
    }
}
