//! Integration test support for the stipend workspace.
//!
//! [`FakeChain`] and [`FakeLedger`] are in-memory implementations of the
//! chain RPC and reward service traits. Both count every call so tests can
//! assert that a workflow did, or did not, touch the network.
//! [`Harness`] wires them into a [`PayoutOrchestrator`] with a custodian and
//! any number of scholar accounts.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use alloy::primitives::keccak256;
use async_trait::async_trait;
use stipend_chain::confirm::ConfirmPolicy;
use stipend_chain::rpc::{ChainRpc, Receipt};
use stipend_chain::{ChainError, ChainParams};
use stipend_crypto::key::{recover_personal_signer, SigningKey};
use stipend_ledger::session::RetryPolicy;
use stipend_ledger::{
    AccessToken, BalanceInfo, ChainSection, ClaimAuthorization, LedgerError, RewardLedger,
};
use stipend_payout::clock::{Clock, ManualClock};
use stipend_payout::{Account, AccountRegistry, PayoutContext, PayoutOrchestrator, PayoutRatio};
use stipend_types::{Address, Backoff, TxHash};

/// Fixed "now" for test scenarios.
pub const NOW: u64 = 1_700_000_000;

/// One day in seconds.
pub const DAY: u64 = 86_400;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// A transaction accepted by [`FakeChain`].
#[derive(Clone, Debug)]
pub struct SubmittedTx {
    /// `keccak256(raw)`.
    pub hash: TxHash,
    /// Signed RLP payload.
    pub raw: Vec<u8>,
    /// Polls left before the receipt appears.
    polls_left: u32,
    /// Whether the receipt reports failure.
    reverted: bool,
}

impl SubmittedTx {
    /// Whether the payload carries `calldata`.
    pub fn carries(&self, calldata: &[u8]) -> bool {
        self.raw.windows(calldata.len()).any(|w| w == calldata)
    }
}

#[derive(Default)]
struct ChainState {
    nonces: HashMap<Address, u64>,
    submitted: Vec<SubmittedTx>,
    send_attempts: usize,
    reject: HashSet<usize>,
    revert: HashSet<usize>,
    pending_polls: u32,
    never_confirm: bool,
}

/// In-memory chain node.
///
/// Submissions are numbered in the order they arrive (rejected ones
/// included). Individual submissions can be scripted to be rejected by the
/// node or to revert on execution.
#[derive(Default)]
pub struct FakeChain {
    state: Mutex<ChainState>,
    nonce_calls: AtomicUsize,
    send_calls: AtomicUsize,
    receipt_calls: AtomicUsize,
}

impl FakeChain {
    /// A chain that confirms every transaction on the second poll.
    pub fn new() -> Arc<Self> {
        let chain = Self::default();
        lock(&chain.state).pending_polls = 1;
        Arc::new(chain)
    }

    /// The `index`-th submission fails at the node.
    pub fn reject_submission(&self, index: usize) {
        lock(&self.state).reject.insert(index);
    }

    /// The `index`-th submission is mined but reverts.
    pub fn revert_submission(&self, index: usize) {
        lock(&self.state).revert.insert(index);
    }

    /// Receipts appear after `polls` "not found" answers.
    pub fn set_pending_polls(&self, polls: u32) {
        lock(&self.state).pending_polls = polls;
    }

    /// Receipts never appear.
    pub fn never_confirm(&self) {
        lock(&self.state).never_confirm = true;
    }

    /// Accepted transactions in submission order.
    pub fn submitted(&self) -> Vec<SubmittedTx> {
        lock(&self.state).submitted.clone()
    }

    /// `eth_sendRawTransaction` calls.
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// `eth_getTransactionReceipt` calls.
    pub fn receipt_calls(&self) -> usize {
        self.receipt_calls.load(Ordering::SeqCst)
    }

    /// Every call of any kind.
    pub fn network_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst) + self.send_calls() + self.receipt_calls()
    }
}

#[async_trait]
impl ChainRpc for FakeChain {
    async fn transaction_count(&self, address: &Address) -> stipend_chain::Result<u64> {
        self.nonce_calls.fetch_add(1, Ordering::SeqCst);
        // Every lookup in these workflows is followed by one submission.
        let mut state = lock(&self.state);
        let nonce = state.nonces.entry(*address).or_insert(0);
        let current = *nonce;
        *nonce += 1;
        Ok(current)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> stipend_chain::Result<TxHash> {
        self.send_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        let index = state.send_attempts;
        state.send_attempts += 1;
        if state.reject.contains(&index) {
            return Err(ChainError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_string(),
            });
        }
        let hash = TxHash::from_bytes(keccak256(raw).0);
        let tx = SubmittedTx {
            hash,
            raw: raw.to_vec(),
            polls_left: state.pending_polls,
            reverted: state.revert.contains(&index),
        };
        state.submitted.push(tx);
        Ok(hash)
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> stipend_chain::Result<Option<Receipt>> {
        self.receipt_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if state.never_confirm {
            return Ok(None);
        }
        let Some(tx) = state.submitted.iter_mut().find(|tx| &tx.hash == hash) else {
            return Ok(None);
        };
        if tx.polls_left > 0 {
            tx.polls_left -= 1;
            return Ok(None);
        }
        Ok(Some(Receipt {
            hash: *hash,
            success: !tx.reverted,
            block_number: Some(1),
        }))
    }
}

// ---------------------------------------------------------------------------
// Reward service
// ---------------------------------------------------------------------------

/// Reward service record of one address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerAccount {
    /// Claimed balance; `None` is reported as `null`.
    pub claimed: Option<i64>,
    /// Lifetime total; `None` is omitted from the record.
    pub total: Option<i64>,
    /// Last claim time; `None` is omitted from the record.
    pub last_claim: Option<i64>,
    /// Amount the next claim authorizes.
    pub claimable: u64,
    /// Authorize claims without crediting the claimed balance.
    pub withhold_credit: bool,
    /// Balance reads fail.
    pub unavailable: bool,
}

impl LedgerAccount {
    /// An account that last claimed at `last_claim` with `claimable`
    /// waiting.
    pub fn ready(claimed: i64, claimable: u64, last_claim: u64) -> Self {
        Self {
            claimed: Some(claimed),
            total: Some(claimed + claimable as i64),
            last_claim: Some(last_claim as i64),
            claimable,
            ..Self::default()
        }
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Address, LedgerAccount>,
    tokens: HashMap<String, Address>,
    failing_logins: u32,
    issued: u64,
}

/// In-memory reward service.
///
/// Login checks the EIP-191 signature against the claimed owner. A claim
/// is credited to the claimed balance as soon as it is authorized.
pub struct FakeLedger {
    state: Mutex<LedgerState>,
    clock: Arc<ManualClock>,
    balance_calls: AtomicUsize,
    login_calls: AtomicUsize,
    claim_calls: AtomicUsize,
}

impl FakeLedger {
    /// An empty service reading time from `clock`.
    pub fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LedgerState::default()),
            clock,
            balance_calls: AtomicUsize::new(0),
            login_calls: AtomicUsize::new(0),
            claim_calls: AtomicUsize::new(0),
        })
    }

    /// Replace the record of `address`.
    pub fn set_account(&self, address: Address, account: LedgerAccount) {
        lock(&self.state).accounts.insert(address, account);
    }

    /// Modify the record of `address`.
    pub fn update(&self, address: &Address, f: impl FnOnce(&mut LedgerAccount)) {
        f(lock(&self.state).accounts.entry(*address).or_default());
    }

    /// Current record of `address`.
    pub fn account(&self, address: &Address) -> LedgerAccount {
        lock(&self.state)
            .accounts
            .get(address)
            .cloned()
            .unwrap_or_default()
    }

    /// The next `count` login challenges fail with a transient error.
    pub fn fail_logins(&self, count: u32) {
        lock(&self.state).failing_logins = count;
    }

    /// Balance record reads.
    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    /// Login challenge requests.
    pub fn login_calls(&self) -> usize {
        self.login_calls.load(Ordering::SeqCst)
    }

    /// Claim authorization requests.
    pub fn claim_calls(&self) -> usize {
        self.claim_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RewardLedger for FakeLedger {
    async fn balance_info(&self, address: &Address) -> stipend_ledger::Result<BalanceInfo> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        let state = lock(&self.state);
        let account = state.accounts.get(address).cloned().unwrap_or_default();
        if account.unavailable {
            return Err(LedgerError::Unavailable("connection reset".to_string()));
        }
        Ok(BalanceInfo {
            total: account.total,
            last_claimed_at: account.last_claim,
            chain: Some(ChainSection {
                balance: account.claimed,
            }),
        })
    }

    async fn create_random_message(&self) -> stipend_ledger::Result<String> {
        let calls = self.login_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = lock(&self.state);
        if state.failing_logins > 0 {
            state.failing_logins -= 1;
            return Err(LedgerError::Rejected {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        Ok(format!("stipend login challenge {calls}"))
    }

    async fn create_access_token(
        &self,
        owner: &Address,
        message: &str,
        signature_hex: &str,
    ) -> stipend_ledger::Result<String> {
        let signer = recover_personal_signer(message.as_bytes(), signature_hex)
            .map_err(|e| LedgerError::Session(e.to_string()))?;
        if &signer != owner {
            return Err(LedgerError::Session(format!("signed by {signer}, not {owner}")));
        }
        let mut state = lock(&self.state);
        state.issued += 1;
        let token = format!("token-{}-{}", owner, state.issued);
        state.tokens.insert(token.clone(), *owner);
        Ok(token)
    }

    async fn request_claim(
        &self,
        token: &AccessToken,
    ) -> stipend_ledger::Result<Option<ClaimAuthorization>> {
        self.claim_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.clock.now();
        let mut state = lock(&self.state);
        if state.tokens.get(token.bearer()) != Some(&token.owner()) {
            return Err(LedgerError::Rejected {
                status: 401,
                body: "invalid access token".to_string(),
            });
        }
        let account = state.accounts.entry(token.owner()).or_default();
        if account.claimable == 0 {
            return Ok(None);
        }
        let amount = account.claimable;
        account.claimable = 0;
        if !account.withhold_credit {
            account.claimed = Some(account.claimed.unwrap_or(0) + amount as i64);
        }
        account.last_claim = Some(now as i64);
        Ok(Some(ClaimAuthorization {
            amount,
            timestamp: now,
            signature: vec![0x5a; 65],
        }))
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// Quick polling with a hard attempt limit so a broken test cannot hang.
pub fn fast_confirm_policy() -> ConfirmPolicy {
    ConfirmPolicy {
        backoff: Backoff::fixed(Duration::from_millis(1)),
        max_attempts: Some(50),
        timeout: None,
    }
}

/// Session retry without noticeable delays.
pub fn fast_session_retry() -> RetryPolicy {
    RetryPolicy {
        max_attempts: 3,
        backoff: Backoff::fixed(Duration::from_millis(1)),
    }
}

/// A registered scholar: display name and account holder share.
pub struct ScholarSpec {
    /// Display name.
    pub name: &'static str,
    /// Account holder share in `[0, 1]`.
    pub ratio: f64,
}

/// Shorthand for a [`ScholarSpec`].
pub fn scholar(name: &'static str, ratio: f64) -> ScholarSpec {
    ScholarSpec { name, ratio }
}

/// Fakes, registry and orchestrator wired together.
pub struct Harness {
    /// Chain fake.
    pub chain: Arc<FakeChain>,
    /// Reward service fake.
    pub ledger: Arc<FakeLedger>,
    /// Time source, starting at [`NOW`].
    pub clock: Arc<ManualClock>,
    /// Resolved accounts, custodian `"academy"` first.
    pub registry: Arc<AccountRegistry>,
    /// Orchestrator under test.
    pub orchestrator: PayoutOrchestrator,
    /// Context shared by the orchestrator.
    pub ctx: Arc<PayoutContext>,
}

impl Harness {
    /// Custodian plus `scholars`, fast confirmation policy.
    pub fn new(scholars: &[ScholarSpec]) -> Self {
        Self::with_context(scholars, |ctx| ctx)
    }

    /// Like [`new`](Self::new), with a hook to adjust the context.
    pub fn with_context(
        scholars: &[ScholarSpec],
        configure: impl FnOnce(PayoutContext) -> PayoutContext,
    ) -> Self {
        let clock = Arc::new(ManualClock::new(NOW));
        let chain = FakeChain::new();
        let ledger = FakeLedger::new(clock.clone());

        let custodian_key = SigningKey::generate();
        let custodian_address = custodian_key.address();
        let mut accounts = vec![Arc::new(
            Account::new("academy", custodian_key, PayoutRatio::ZERO, custodian_address, None)
                .expect("custodian account"),
        )];
        for spec in scholars {
            let ratio = PayoutRatio::from_fraction(spec.ratio).expect("ratio");
            let holder = SigningKey::generate().address();
            accounts.push(Arc::new(
                Account::new(
                    spec.name,
                    SigningKey::generate(),
                    ratio,
                    custodian_address,
                    Some(holder),
                )
                .expect("scholar account"),
            ));
        }
        let registry = Arc::new(AccountRegistry::from_accounts(accounts).expect("registry"));

        let ctx = PayoutContext::new(ledger.clone(), chain.clone(), ChainParams::ronin_slp())
            .with_confirm_policy(fast_confirm_policy())
            .with_session_retry(fast_session_retry())
            .with_clock(clock.clone());
        let ctx = Arc::new(configure(ctx));
        let orchestrator = PayoutOrchestrator::new(ctx.clone(), registry.clone());

        Self {
            chain,
            ledger,
            clock,
            registry,
            orchestrator,
            ctx,
        }
    }

    /// Account by name.
    pub fn account(&self, name: &str) -> Arc<Account> {
        self.registry.by_name(name).cloned().expect("registered account")
    }

    /// Give `name` a claimable balance, last claimed `days_ago` days ago.
    pub fn fund(&self, name: &str, claimed: i64, claimable: u64, days_ago: u64) {
        let address = self.account(name).address();
        self.ledger
            .set_account(address, LedgerAccount::ready(claimed, claimable, NOW - days_ago * DAY));
    }
}
