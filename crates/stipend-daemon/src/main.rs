//! stipend: claim and pay out scholarship account rewards.
//!
//! Reads one TOML config, builds the account registry and payout context,
//! runs a single command and prints its result as JSON. Ctrl-C aborts any
//! confirmation wait in progress.

mod commands;
mod config;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use stipend_chain::rpc::ProviderRpc;
use stipend_ledger::http::HttpRewardLedger;
use stipend_payout::{AccountRegistry, PayoutContext, PayoutOrchestrator};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::config::{AccountEntry, StipendConfig};

#[derive(Parser)]
#[command(name = "stipend")]
#[command(about = "Claim and split scholarship account rewards", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Show balances and claim cooldown
    Status {
        /// Account name; all accounts if omitted
        name: Option<String>,
    },
    /// Claim rewards for one account
    Claim {
        /// Account name
        name: String,
    },
    /// Claim rewards for every account
    ClaimAll,
    /// Claim and split rewards for one account
    Payout {
        /// Account name
        name: String,

        /// Send the whole claimed balance to the custodian, no split
        #[arg(long)]
        to_custodian: bool,
    },
    /// Claim and split rewards for every account
    PayoutAll,
    /// Send tokens from one account to another account or address
    Transfer {
        /// Sending account, by name or address
        from: String,
        /// Receiving account name, or any address
        to: String,
        /// Amount in whole tokens
        #[arg(allow_negative_numbers = true)]
        amount: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Load config
    let config_path = StipendConfig::resolve_path(cli.config);
    let config = StipendConfig::load(&config_path)?;

    // 2. Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("stipend={}", config.advanced.log_level).parse()?),
        )
        .init();

    info!(config = %config_path.display(), "stipend starting");

    // 3. Resolve accounts
    let custodian = config
        .custodian
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("config has no [custodian] section"))?
        .to_spec();
    let accounts: Vec<_> = config.accounts.iter().map(AccountEntry::to_spec).collect();
    let registry = Arc::new(AccountRegistry::resolve(&custodian, &accounts)?);

    // 4. Build clients and context
    let ledger = Arc::new(HttpRewardLedger::new(
        config.ledger.api_url.clone(),
        config.ledger.graphql_url.clone(),
        config.ledger.request_timeout(),
    )?);
    let chain = Arc::new(ProviderRpc::connect(
        &config.network.rpc_url,
        config.ledger.request_timeout(),
    )?);
    let (shutdown_tx, _) = broadcast::channel(1);
    let ctx = Arc::new(
        PayoutContext::new(ledger, chain, config.network.chain_params())
            .with_confirm_policy(config.confirmation.policy())
            .with_session_retry(config.ledger.retry_policy())
            .with_shutdown(shutdown_tx.clone()),
    );
    let orchestrator = PayoutOrchestrator::new(ctx, registry);

    // 5. Ctrl-C cancels pending confirmation waits
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, aborting confirmation waits");
            let _ = shutdown_tx.send(());
        }
    });

    // 6. Run the command
    match cli.command {
        Command::Status { name } => commands::status(&orchestrator, name.as_deref()).await?,
        Command::Claim { name } => commands::claim(&orchestrator, &name).await?,
        Command::ClaimAll => commands::claim_all(&orchestrator).await?,
        Command::Payout { name, to_custodian } => {
            commands::payout(&orchestrator, &name, to_custodian).await?
        }
        Command::PayoutAll => commands::payout_all(&orchestrator).await?,
        Command::Transfer { from, to, amount } => {
            commands::transfer(&orchestrator, &from, &to, amount).await?
        }
    }

    info!("stipend finished");
    Ok(())
}
