//! # stipend-ledger
//!
//! Client side of the off-chain reward service: balance queries, login
//! sessions and claim authorizations.
//!
//! ## Modules
//!
//! - [`balance`] - [`BalanceReader`](balance::BalanceReader) and response normalisation
//! - [`session`] - Account-scoped access tokens with bounded retry
//! - [`http`] - reqwest implementation of [`RewardLedger`]

pub mod balance;
pub mod http;
pub mod session;

use async_trait::async_trait;
use serde::Deserialize;
use stipend_types::Address;
use zeroize::Zeroizing;

/// Error types for reward service operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The service could not be reached or answered with malformed data.
    #[error("reward ledger unavailable: {0}")]
    Unavailable(String),

    /// The service answered with a non-success HTTP status.
    #[error("reward ledger rejected request: http {status}: {body}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// Session establishment or use failed.
    #[error("session error: {0}")]
    Session(String),

    /// Signing the login challenge failed.
    #[error("signing error: {0}")]
    Signing(#[from] stipend_crypto::CryptoError),
}

impl LedgerError {
    /// Whether repeating the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            LedgerError::Unavailable(_) => true,
            LedgerError::Rejected { status, .. } => *status == 429 || *status >= 500,
            LedgerError::Session(_) | LedgerError::Signing(_) => false,
        }
    }
}

/// Convenience result type for reward service operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Reward balance record as reported by the service, before normalisation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct BalanceInfo {
    /// Lifetime rewards earned.
    #[serde(default)]
    pub total: Option<i64>,
    /// Unix time of the last claim.
    #[serde(default, rename = "last_claimed_item_at")]
    pub last_claimed_at: Option<i64>,
    /// On-chain section; absent when the service has no chain record.
    #[serde(default, rename = "blockchain_related")]
    pub chain: Option<ChainSection>,
}

/// The `blockchain_related` part of a balance record.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct ChainSection {
    /// Claimed balance; `null` before the first claim.
    #[serde(default)]
    pub balance: Option<i64>,
}

/// Server-signed permission to claim `amount` on-chain.
#[derive(Clone, PartialEq, Eq)]
pub struct ClaimAuthorization {
    /// Amount the checkpoint call will credit.
    pub amount: u64,
    /// Timestamp bound into the signature.
    pub timestamp: u64,
    /// Reward service signature over `(owner, amount, timestamp)`.
    pub signature: Vec<u8>,
}

impl std::fmt::Debug for ClaimAuthorization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClaimAuthorization")
            .field("amount", &self.amount)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Bearer token for one account's reward service session.
#[derive(Clone)]
pub struct AccessToken {
    owner: Address,
    token: Zeroizing<String>,
}

impl AccessToken {
    /// Bind `token` to the account it was issued for.
    pub fn new(owner: Address, token: String) -> Self {
        Self {
            owner,
            token: Zeroizing::new(token),
        }
    }

    /// Account this token was issued for.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Bearer value for the `authorization` header.
    pub fn bearer(&self) -> &str {
        &self.token
    }

    /// Refuse to use this token on behalf of another account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Session`] if `address` is not the token owner
    pub fn ensure_owner(&self, address: &Address) -> Result<()> {
        if &self.owner != address {
            return Err(LedgerError::Session(format!(
                "token issued for {} used for {address}",
                self.owner
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}

/// Operations offered by the reward service.
#[async_trait]
pub trait RewardLedger: Send + Sync {
    /// Balance record for `address`.
    async fn balance_info(&self, address: &Address) -> Result<BalanceInfo>;

    /// A fresh login challenge to sign.
    async fn create_random_message(&self) -> Result<String>;

    /// Exchange a signed challenge for a bearer token.
    async fn create_access_token(
        &self,
        owner: &Address,
        message: &str,
        signature_hex: &str,
    ) -> Result<String>;

    /// Ask for a claim authorization for the token owner.
    ///
    /// `Ok(None)` means there is nothing to claim.
    async fn request_claim(&self, token: &AccessToken) -> Result<Option<ClaimAuthorization>>;
}
