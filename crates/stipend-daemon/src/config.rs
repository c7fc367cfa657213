//! Configuration file management.
//!
//! One TOML file describes the chain endpoint, the reward service, the
//! confirmation policy and every managed account. It is read once at
//! startup and converted into an immutable account registry and payout
//! context.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Deserializer};
use stipend_chain::confirm::ConfirmPolicy;
use stipend_chain::ChainParams;
use stipend_ledger::session::RetryPolicy;
use stipend_payout::AccountSpec;
use stipend_types::{Address, Backoff};
use zeroize::Zeroizing;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "STIPEND_CONFIG";

/// Config file used when neither `--config` nor [`CONFIG_ENV`] is set.
pub const DEFAULT_CONFIG_FILE: &str = "stipend.toml";

/// Complete configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StipendConfig {
    /// Chain settings.
    #[serde(default)]
    pub network: NetworkConfig,
    /// Reward service settings.
    #[serde(default)]
    pub ledger: LedgerConfig,
    /// Transaction confirmation settings.
    #[serde(default)]
    pub confirmation: ConfirmationConfig,
    /// The custodian account.
    pub custodian: Option<AccountEntry>,
    /// Managed scholarship accounts.
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Chain configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
    /// JSON-RPC endpoint.
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,
    /// EIP-155 chain id.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Token contract address.
    #[serde(default = "default_token_contract")]
    pub token_contract: Address,
    /// Gas limit for claim transactions.
    #[serde(default = "default_claim_gas_limit")]
    pub claim_gas_limit: u64,
    /// Gas limit for transfers.
    #[serde(default = "default_transfer_gas_limit")]
    pub transfer_gas_limit: u64,
    /// Gas price in wei.
    #[serde(default)]
    pub gas_price: u64,
}

/// Reward service configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// REST base URL for balances and claims.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// GraphQL endpoint for login.
    #[serde(default = "default_graphql_url")]
    pub graphql_url: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Attempts at establishing a session, including the first.
    #[serde(default = "default_session_max_attempts")]
    pub session_max_attempts: u32,
    /// Delay before the first session retry, in milliseconds. Doubles per
    /// attempt.
    #[serde(default = "default_session_backoff_ms")]
    pub session_backoff_ms: u64,
}

/// Confirmation polling configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationConfig {
    /// Delay between receipt polls, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Give up after this many polls. 0 = never.
    #[serde(default)]
    pub max_attempts: u32,
    /// Give up after this many seconds. 0 = never.
    #[serde(default)]
    pub timeout_secs: u64,
    /// Growth of the poll interval per attempt. 1.0 = fixed.
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
    /// Upper bound for the poll interval, in seconds.
    #[serde(default = "default_max_interval")]
    pub max_interval_secs: u64,
}

/// One `[custodian]` or `[[accounts]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountEntry {
    /// Display name.
    pub name: String,
    /// Account address, `0x` or `ronin:` form.
    pub address: String,
    /// Hex private key.
    pub private_key: Secret,
    /// Account holder share in `[0, 1]`. Ignored for the custodian.
    #[serde(default)]
    pub payout_ratio: f64,
    /// Where the account holder share goes.
    #[serde(default)]
    pub holder_address: Option<String>,
}

/// Advanced configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// A secret string. Zeroized on drop, never printed.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// The secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(|s| Secret(Zeroizing::new(s)))
    }
}

// Default value functions

fn default_rpc_url() -> String {
    "https://proxy.roninchain.com/free-gas-rpc".to_string()
}

fn default_chain_id() -> u64 {
    stipend_types::RONIN_CHAIN_ID
}

fn default_token_contract() -> Address {
    ChainParams::ronin_slp().token_contract
}

fn default_claim_gas_limit() -> u64 {
    1_000_000
}

fn default_transfer_gas_limit() -> u64 {
    100_000
}

fn default_api_url() -> String {
    "https://game-api.skymavis.com/game-api/".to_string()
}

fn default_graphql_url() -> String {
    "https://axieinfinity.com/graphql-server-v2/graphql".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_session_max_attempts() -> u32 {
    3
}

fn default_session_backoff_ms() -> u64 {
    500
}

fn default_poll_interval() -> u64 {
    5
}

fn default_backoff_factor() -> f64 {
    1.0
}

fn default_max_interval() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            chain_id: default_chain_id(),
            token_contract: default_token_contract(),
            claim_gas_limit: default_claim_gas_limit(),
            transfer_gas_limit: default_transfer_gas_limit(),
            gas_price: 0,
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            graphql_url: default_graphql_url(),
            request_timeout_secs: default_request_timeout(),
            session_max_attempts: default_session_max_attempts(),
            session_backoff_ms: default_session_backoff_ms(),
        }
    }
}

impl Default for ConfirmationConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_attempts: 0,
            timeout_secs: 0,
            backoff_factor: default_backoff_factor(),
            max_interval_secs: default_max_interval(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl NetworkConfig {
    /// Chain parameters for transaction building.
    pub fn chain_params(&self) -> ChainParams {
        ChainParams {
            chain_id: self.chain_id,
            token_contract: self.token_contract,
            claim_gas_limit: self.claim_gas_limit,
            transfer_gas_limit: self.transfer_gas_limit,
            gas_price: self.gas_price,
        }
    }
}

impl LedgerConfig {
    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Session retry policy.
    pub fn retry_policy(&self) -> RetryPolicy {
        let initial = Duration::from_millis(self.session_backoff_ms);
        RetryPolicy {
            max_attempts: self.session_max_attempts.max(1),
            backoff: Backoff::exponential(initial, 2.0, initial.saturating_mul(16)),
        }
    }
}

impl ConfirmationConfig {
    /// Confirmation policy. Zero limits mean unbounded.
    pub fn policy(&self) -> ConfirmPolicy {
        let interval = Duration::from_secs(self.poll_interval_secs);
        let max = Duration::from_secs(self.max_interval_secs).max(interval);
        ConfirmPolicy {
            backoff: Backoff::exponential(interval, self.backoff_factor, max),
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            timeout: (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs)),
        }
    }
}

impl AccountEntry {
    /// Registry input for this entry.
    pub fn to_spec(&self) -> AccountSpec {
        AccountSpec {
            name: self.name.clone(),
            address: self.address.clone(),
            private_key: Zeroizing::new(self.private_key.expose().to_string()),
            payout_ratio: self.payout_ratio,
            holder_address: self.holder_address.clone(),
        }
    }
}

impl StipendConfig {
    /// Config path from the command line, else [`CONFIG_ENV`], else
    /// [`DEFAULT_CONFIG_FILE`].
    pub fn resolve_path(cli: Option<PathBuf>) -> PathBuf {
        cli.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE))
    }

    /// Load configuration from `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Parse configuration from TOML text.
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: StipendConfig = toml::from_str(content)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[network]
rpc_url = "http://localhost:8545"

[confirmation]
max_attempts = 40
timeout_secs = 600

[custodian]
name = "academy"
address = "ronin:2c7536e3605d9c16a7a3d7b1898e529396a65c23"
private_key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"

[[accounts]]
name = "scholar-1"
address = "0x9d8a62f656a8d1615c1294fd71e9cfb3e4855a4f"
private_key = "4646464646464646464646464646464646464646464646464646464646464646"
payout_ratio = 0.45
holder_address = "ronin:1111111111111111111111111111111111111111"
"#;

    #[test]
    fn test_default_config() {
        let config = StipendConfig::default();
        assert_eq!(config.network.chain_id, 2020);
        assert_eq!(config.network.gas_price, 0);
        assert_eq!(config.network.token_contract.to_string(), stipend_types::SLP_CONTRACT);
        assert_eq!(config.ledger.request_timeout_secs, 30);
        assert_eq!(config.confirmation.poll_interval_secs, 5);
        assert_eq!(config.advanced.log_level, "info");
        assert!(!config.confirmation.policy().is_bounded());
    }

    #[test]
    fn test_parse_sample() {
        let config = StipendConfig::parse(SAMPLE).expect("parse");
        assert_eq!(config.network.rpc_url, "http://localhost:8545");
        assert_eq!(config.network.claim_gas_limit, 1_000_000);
        let custodian = config.custodian.as_ref().expect("custodian");
        assert_eq!(custodian.name, "academy");
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].payout_ratio, 0.45);

        let policy = config.confirmation.policy();
        assert_eq!(policy.max_attempts, Some(40));
        assert_eq!(policy.timeout, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_secrets_not_printed() {
        let config = StipendConfig::parse(SAMPLE).expect("parse");
        let printed = format!("{config:?}");
        assert!(!printed.contains("4c0883a6"));
        assert!(!printed.contains("46464646"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_specs_resolve() {
        let config = StipendConfig::parse(SAMPLE).expect("parse");
        let custodian = config.custodian.as_ref().expect("custodian").to_spec();
        let accounts: Vec<_> = config.accounts.iter().map(AccountEntry::to_spec).collect();
        let registry =
            stipend_payout::AccountRegistry::resolve(&custodian, &accounts).expect("resolve");
        assert_eq!(registry.accounts().len(), 2);
    }

    #[test]
    fn test_cli_path_wins() {
        let path = StipendConfig::resolve_path(Some(PathBuf::from("/etc/stipend.toml")));
        assert_eq!(path, PathBuf::from("/etc/stipend.toml"));
    }
}
