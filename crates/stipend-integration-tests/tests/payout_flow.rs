//! Integration test: single-account payout workflow.
//!
//! Exercises claim -> balance re-read -> split -> custodian leg -> holder
//! leg against the in-memory chain and reward service:
//! 1. Ten percent scholar with 1000 claimable
//! 2. Custodian self-payout
//! 3. Empty outcomes (nothing to claim, zero balance, cooldown)
//! 4. Partial failures (one leg rejected or reverted, reverted claim)
//! 5. Balance claimed earlier is paid out during the cooldown
//! 6. Sweep mode sends everything to the custodian

use stipend_chain::calls;
use stipend_integration_tests::{scholar, Harness};
use stipend_payout::orchestrator::{ClaimReport, LegOutcome, Stage};
use stipend_payout::ErrorKind;
use stipend_types::TxStatus;

#[tokio::test]
async fn test_ten_percent_split_of_thousand() {
    let h = Harness::new(&[scholar("scholar-1", 0.1)]);
    h.fund("scholar-1", 0, 1000, 15);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert!(matches!(result.claim, ClaimReport::Claimed { amount: 1000, .. }));
    assert_eq!(result.claimed_balance, Some(1000));
    let split = result.split.expect("split computed");
    assert_eq!(split.holder_amount, 100);
    assert_eq!(split.custodian_amount, 900);

    assert_eq!(result.custodian_leg.to, Some(account.custodian()));
    assert_eq!(result.custodian_leg.amount, 900);
    assert_eq!(result.holder_leg.to, account.holder_address());
    assert_eq!(result.holder_leg.amount, 100);

    let transfers = result.transfers();
    assert_eq!(transfers.len(), 2);
    assert!(transfers.iter().all(|tx| tx.status == TxStatus::Confirmed));

    // Claim first, then custodian leg, then holder leg.
    let submitted = h.chain.submitted();
    assert_eq!(submitted.len(), 3);
    assert!(submitted[0].carries(&calls::CHECKPOINT_SELECTOR));
    assert!(submitted[1].carries(&calls::encode_transfer(&account.custodian(), 900)));
    let holder = account.holder_address().expect("holder");
    assert!(submitted[2].carries(&calls::encode_transfer(&holder, 100)));
    assert_eq!(submitted[1].hash, transfers[0].hash);
    assert_eq!(submitted[2].hash, transfers[1].hash);
}

#[tokio::test]
async fn test_custodian_self_payout() {
    let h = Harness::new(&[]);
    h.fund("academy", 0, 500, 20);
    let custodian = h.account("academy");

    let result = h.orchestrator.payout(&custodian).await;

    assert!(result.errors.is_empty());
    assert_eq!(result.claimed_balance, Some(500));
    assert_eq!(result.custodian_leg.to, Some(custodian.address()));
    assert_eq!(result.custodian_leg.amount, 500);
    assert!(matches!(result.custodian_leg.outcome, LegOutcome::Sent { .. }));
    assert_eq!(result.holder_leg.outcome, LegOutcome::NothingToSend);

    let submitted = h.chain.submitted();
    assert_eq!(submitted.len(), 2, "claim plus a single transfer");
    assert!(submitted[1].carries(&calls::encode_transfer(&custodian.address(), 500)));
}

#[tokio::test]
async fn test_existing_balance_is_included() {
    let h = Harness::new(&[scholar("scholar-1", 0.5)]);
    h.fund("scholar-1", 7, 100, 15);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;

    assert_eq!(result.claimed_balance, Some(107));
    let split = result.split.expect("split");
    assert_eq!(split.holder_amount, 54);
    assert_eq!(split.custodian_amount, 53);
}

#[tokio::test]
async fn test_nothing_to_claim() {
    let h = Harness::new(&[scholar("scholar-1", 0.3)]);
    h.fund("scholar-1", 0, 0, 15);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;

    assert_eq!(result.claim, ClaimReport::NothingToClaim);
    assert!(result.errors.is_empty());
    assert_eq!(result.custodian_leg.outcome, LegOutcome::NotAttempted);
    assert_eq!(result.holder_leg.outcome, LegOutcome::NotAttempted);
    assert_eq!(h.chain.network_calls(), 0);
}

#[tokio::test]
async fn test_zero_balance_after_claim_sends_nothing() {
    let h = Harness::new(&[scholar("scholar-1", 0.3)]);
    h.fund("scholar-1", 0, 40, 15);
    let account = h.account("scholar-1");
    h.ledger.update(&account.address(), |a| a.withhold_credit = true);

    let result = h.orchestrator.payout(&account).await;

    assert!(result.errors.is_empty());
    assert_eq!(result.claimed_balance, Some(0));
    assert_eq!(result.split, None);
    assert_eq!(result.custodian_leg.outcome, LegOutcome::NothingToSend);
    assert_eq!(result.holder_leg.outcome, LegOutcome::NothingToSend);
    assert_eq!(h.chain.submitted().len(), 1, "only the claim");
}

#[tokio::test]
async fn test_cooldown_skips_claim_and_login() {
    let h = Harness::new(&[scholar("scholar-1", 0.3)]);
    h.fund("scholar-1", 0, 1000, 3);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;

    let ClaimReport::Cooldown { remaining } = result.claim else {
        unreachable!("expected cooldown, got {:?}", result.claim);
    };
    assert_eq!(remaining.days, 11);
    assert!(result.errors.is_empty(), "cooldown is not an error");
    assert_eq!(result.claimed_balance, Some(0));
    assert_eq!(result.custodian_leg.outcome, LegOutcome::NothingToSend);
    assert_eq!(result.holder_leg.outcome, LegOutcome::NothingToSend);
    assert_eq!(h.ledger.login_calls(), 0);
    assert_eq!(h.ledger.claim_calls(), 0);
    assert_eq!(h.chain.network_calls(), 0);
}

#[tokio::test]
async fn test_claimed_balance_is_distributed_during_cooldown() {
    let h = Harness::new(&[scholar("scholar-1", 0.3)]);
    // Left over from an earlier run whose transfers did not go out.
    h.fund("scholar-1", 600, 0, 3);
    let account = h.account("scholar-1");
    let holder = account.holder_address().expect("holder");

    let result = h.orchestrator.payout(&account).await;

    assert!(matches!(result.claim, ClaimReport::Cooldown { .. }));
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.claimed_balance, Some(600));
    assert_eq!(result.custodian_leg.amount, 420);
    assert_eq!(result.holder_leg.amount, 180);
    assert!(matches!(result.custodian_leg.outcome, LegOutcome::Sent { .. }));
    assert!(matches!(result.holder_leg.outcome, LegOutcome::Sent { .. }));

    assert_eq!(h.ledger.claim_calls(), 0);
    let submitted = h.chain.submitted();
    assert_eq!(submitted.len(), 2, "two transfers, no claim");
    assert!(submitted[0].carries(&calls::encode_transfer(&account.custodian(), 420)));
    assert!(submitted[1].carries(&calls::encode_transfer(&holder, 180)));
}

#[tokio::test]
async fn test_sweep_sends_everything_to_custodian() {
    let h = Harness::new(&[scholar("scholar-1", 0.3)]);
    h.fund("scholar-1", 0, 500, 15);
    let account = h.account("scholar-1");

    let result = h.orchestrator.sweep(&account).await;

    assert!(matches!(result.claim, ClaimReport::Claimed { amount: 500, .. }));
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.custodian_leg.amount, 500);
    assert!(matches!(result.custodian_leg.outcome, LegOutcome::Sent { .. }));
    assert_eq!(result.holder_leg.outcome, LegOutcome::NothingToSend);
    assert_eq!(result.holder_leg.amount, 0);

    let submitted = h.chain.submitted();
    assert_eq!(submitted.len(), 2, "claim and one transfer");
    assert!(submitted[1].carries(&calls::encode_transfer(&account.custodian(), 500)));
}

#[tokio::test]
async fn test_failed_custodian_leg_does_not_stop_holder_leg() {
    let h = Harness::new(&[scholar("scholar-1", 0.25)]);
    h.fund("scholar-1", 0, 400, 15);
    let account = h.account("scholar-1");
    // Submission 0 is the claim, 1 the custodian leg.
    h.chain.reject_submission(1);

    let result = h.orchestrator.payout(&account).await;

    assert_eq!(result.custodian_leg.outcome, LegOutcome::Failed);
    assert_eq!(result.custodian_leg.amount, 300);
    assert!(matches!(result.holder_leg.outcome, LegOutcome::Sent { .. }));
    assert_eq!(result.holder_leg.amount, 100);

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].stage, Stage::CustodianTransfer);
    assert_eq!(result.errors[0].kind, ErrorKind::SubmissionFailure);
    assert_eq!(result.errors[0].hash, None);
}

#[tokio::test]
async fn test_reverted_holder_leg_is_reported_with_hash() {
    let h = Harness::new(&[scholar("scholar-1", 0.25)]);
    h.fund("scholar-1", 0, 400, 15);
    let account = h.account("scholar-1");
    h.chain.revert_submission(2);

    let result = h.orchestrator.payout(&account).await;

    assert!(matches!(result.custodian_leg.outcome, LegOutcome::Sent { .. }));
    assert_eq!(result.holder_leg.outcome, LegOutcome::Failed);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].stage, Stage::HolderTransfer);
    assert_eq!(result.errors[0].kind, ErrorKind::TransactionReverted);
    assert_eq!(result.errors[0].hash, Some(h.chain.submitted()[2].hash));
}

#[tokio::test]
async fn test_reverted_claim_still_distributes_earlier_balance() {
    let h = Harness::new(&[scholar("scholar-1", 0.25)]);
    h.fund("scholar-1", 250, 400, 15);
    let account = h.account("scholar-1");
    h.ledger.update(&account.address(), |a| a.withhold_credit = true);
    h.chain.revert_submission(0);

    let result = h.orchestrator.payout(&account).await;

    assert_eq!(result.claim, ClaimReport::Failed);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].stage, Stage::Claim);
    assert_eq!(result.errors[0].kind, ErrorKind::TransactionReverted);
    assert_eq!(result.errors[0].hash, Some(h.chain.submitted()[0].hash));

    assert_eq!(result.claimed_balance, Some(250));
    assert_eq!(result.holder_leg.amount, 63);
    assert_eq!(result.custodian_leg.amount, 187);
    assert_eq!(result.transfers().len(), 2);
    assert_eq!(h.chain.submitted().len(), 3);
}

#[tokio::test]
async fn test_transient_login_failures_are_retried() {
    let h = Harness::new(&[scholar("scholar-1", 0.5)]);
    h.fund("scholar-1", 0, 10, 15);
    h.ledger.fail_logins(2);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;

    assert!(result.errors.is_empty(), "errors: {:?}", result.errors);
    assert_eq!(h.ledger.login_calls(), 3);
    assert_eq!(result.transfers().len(), 2);
}

#[tokio::test]
async fn test_login_retries_are_bounded() {
    let h = Harness::new(&[scholar("scholar-1", 0.5)]);
    h.fund("scholar-1", 0, 10, 15);
    h.ledger.fail_logins(10);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].kind, ErrorKind::LedgerUnavailable);
    assert_eq!(h.ledger.login_calls(), 3);
    assert_eq!(h.chain.network_calls(), 0);
}

#[tokio::test]
async fn test_result_serializes_for_callers() {
    let h = Harness::new(&[scholar("scholar-1", 0.1)]);
    h.fund("scholar-1", 0, 1000, 15);
    let account = h.account("scholar-1");

    let result = h.orchestrator.payout(&account).await;
    let json = serde_json::to_value(&result).expect("serialize");

    assert_eq!(json["account"], "scholar-1");
    assert_eq!(json["claim"]["outcome"], "claimed");
    assert_eq!(json["custodian_leg"]["outcome"], "sent");
    assert_eq!(json["custodian_leg"]["transaction"]["status"], "confirmed");
    assert_eq!(json["holder_leg"]["amount"], 100);
}
