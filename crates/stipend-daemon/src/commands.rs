//! Command handlers. Each prints its structured result as JSON on stdout.

use serde::Serialize;
use serde_json::json;
use stipend_payout::PayoutOrchestrator;

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn find<'a>(
    orchestrator: &'a PayoutOrchestrator,
    name: &str,
) -> anyhow::Result<&'a std::sync::Arc<stipend_payout::Account>> {
    orchestrator
        .registry()
        .lookup(name)
        .ok_or_else(|| anyhow::anyhow!("no account named {name:?}"))
}

/// Balances and cooldown of one account, or of all of them.
pub async fn status(orchestrator: &PayoutOrchestrator, name: Option<&str>) -> anyhow::Result<()> {
    let accounts = match name {
        Some(name) => vec![find(orchestrator, name)?.clone()],
        None => orchestrator.registry().accounts().to_vec(),
    };

    let mut report = Vec::with_capacity(accounts.len());
    for account in &accounts {
        let entry = match orchestrator.status(account).await {
            Ok(status) => serde_json::to_value(status)?,
            Err(e) => json!({
                "account": account.name(),
                "address": account.address(),
                "error": e.to_string(),
            }),
        };
        report.push(entry);
    }
    print_json(&report)
}

/// Claim one account without distributing.
pub async fn claim(orchestrator: &PayoutOrchestrator, name: &str) -> anyhow::Result<()> {
    let account = find(orchestrator, name)?;
    print_json(&orchestrator.claim_only(account).await)
}

/// Claim every account without distributing.
pub async fn claim_all(orchestrator: &PayoutOrchestrator) -> anyhow::Result<()> {
    print_json(&orchestrator.claim_all().await)
}

/// Claim and distribute one account. With `to_custodian` the whole
/// balance goes to the custodian.
pub async fn payout(
    orchestrator: &PayoutOrchestrator,
    name: &str,
    to_custodian: bool,
) -> anyhow::Result<()> {
    let account = find(orchestrator, name)?;
    let result = if to_custodian {
        orchestrator.sweep(account).await
    } else {
        orchestrator.payout(account).await
    };
    print_json(&result)
}

/// Claim and distribute every account.
pub async fn payout_all(orchestrator: &PayoutOrchestrator) -> anyhow::Result<()> {
    print_json(&orchestrator.payout_all().await)
}

/// Operator transfer from a registered account.
pub async fn transfer(
    orchestrator: &PayoutOrchestrator,
    from: &str,
    to: &str,
    amount: i64,
) -> anyhow::Result<()> {
    let account = find(orchestrator, from)?;
    let transaction = orchestrator.manual_transfer(account, to, amount).await?;
    print_json(&json!({
        "account": account.name(),
        "from": account.address(),
        "to": to,
        "amount": amount,
        "transaction": transaction,
    }))
}
