//! Account-scoped reward service sessions.
//!
//! Login is a challenge/response: fetch a random message, sign it as an
//! EIP-191 personal message with the account key, exchange the signature
//! for a bearer token. Transient failures anywhere in that sequence are
//! retried a bounded number of times.

use std::sync::Arc;
use std::time::Duration;

use stipend_crypto::key::SigningKey;
use stipend_types::Backoff;

use crate::{AccessToken, LedgerError, Result, RewardLedger};

/// Bounded retry for session establishment.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay between attempts.
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(
                Duration::from_millis(500),
                2.0,
                Duration::from_secs(5),
            ),
        }
    }
}

/// Obtains access tokens for individual accounts.
#[derive(Clone)]
pub struct SessionAuthenticator {
    ledger: Arc<dyn RewardLedger>,
    retry: RetryPolicy,
}

impl SessionAuthenticator {
    /// Create an authenticator over `ledger`.
    pub fn new(ledger: Arc<dyn RewardLedger>, retry: RetryPolicy) -> Self {
        Self { ledger, retry }
    }

    /// Log in as the account controlled by `key`.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Session`] if the service returns an empty token
    /// - the last error seen once transient failures exhaust the retry budget,
    ///   or immediately for non-transient failures
    pub async fn authenticate(&self, key: &SigningKey) -> Result<AccessToken> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0u32;
        loop {
            match self.try_authenticate(key).await {
                Ok(token) => return Ok(token),
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.retry.backoff.delay(attempt);
                    tracing::warn!(
                        address = %key.address(),
                        attempt = attempt + 1,
                        max_attempts,
                        ?delay,
                        error = %e,
                        "session login failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_authenticate(&self, key: &SigningKey) -> Result<AccessToken> {
        let owner = key.address();
        let message = self.ledger.create_random_message().await?;
        if message.is_empty() {
            return Err(LedgerError::Unavailable(
                "empty login challenge".to_string(),
            ));
        }
        let signature = key.sign_personal_message(message.as_bytes())?;
        let token = self
            .ledger
            .create_access_token(&owner, &message, &signature.to_hex())
            .await?;
        if token.is_empty() {
            return Err(LedgerError::Session(format!(
                "empty access token for {owner}"
            )));
        }
        tracing::debug!(address = %owner, "reward service session established");
        Ok(AccessToken::new(owner, token))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use stipend_crypto::key::recover_personal_signer;
    use stipend_types::Address;

    use super::*;
    use crate::{BalanceInfo, ClaimAuthorization};

    struct FlakyLedger {
        failures_left: AtomicU32,
        challenges: AtomicU32,
        permanent: bool,
        seen_signer: Mutex<Option<Address>>,
    }

    impl FlakyLedger {
        fn new(failures: u32, permanent: bool) -> Arc<Self> {
            Arc::new(Self {
                failures_left: AtomicU32::new(failures),
                challenges: AtomicU32::new(0),
                permanent,
                seen_signer: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl RewardLedger for FlakyLedger {
        async fn balance_info(&self, _address: &Address) -> Result<BalanceInfo> {
            Ok(BalanceInfo::default())
        }

        async fn create_random_message(&self) -> Result<String> {
            self.challenges.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                if self.permanent {
                    return Err(LedgerError::Rejected {
                        status: 403,
                        body: "forbidden".to_string(),
                    });
                }
                return Err(LedgerError::Unavailable("timeout".to_string()));
            }
            Ok("challenge-123".to_string())
        }

        async fn create_access_token(
            &self,
            owner: &Address,
            message: &str,
            signature_hex: &str,
        ) -> Result<String> {
            let signer =
                recover_personal_signer(message.as_bytes(), signature_hex).expect("recover");
            *self.seen_signer.lock().expect("lock") = Some(signer);
            Ok(format!("token-for-{owner}"))
        }

        async fn request_claim(&self, _: &AccessToken) -> Result<Option<ClaimAuthorization>> {
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_login_signs_challenge_with_account_key() {
        let ledger = FlakyLedger::new(0, false);
        let auth = SessionAuthenticator::new(ledger.clone(), RetryPolicy::default());
        let key = SigningKey::generate();
        let token = auth.authenticate(&key).await.expect("login");
        assert_eq!(token.owner(), key.address());
        assert_eq!(*ledger.seen_signer.lock().expect("lock"), Some(key.address()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_retried_within_budget() {
        let ledger = FlakyLedger::new(2, false);
        let auth = SessionAuthenticator::new(ledger.clone(), RetryPolicy::default());
        auth.authenticate(&SigningKey::generate()).await.expect("third attempt succeeds");
        assert_eq!(ledger.challenges.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_is_bounded() {
        let ledger = FlakyLedger::new(10, false);
        let auth = SessionAuthenticator::new(ledger.clone(), RetryPolicy::default());
        let err = auth
            .authenticate(&SigningKey::generate())
            .await
            .expect_err("gives up");
        assert!(matches!(err, LedgerError::Unavailable(_)));
        assert_eq!(ledger.challenges.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_not_retried() {
        let ledger = FlakyLedger::new(1, true);
        let auth = SessionAuthenticator::new(ledger.clone(), RetryPolicy::default());
        assert!(auth.authenticate(&SigningKey::generate()).await.is_err());
        assert_eq!(ledger.challenges.load(Ordering::SeqCst), 1);
    }
}
