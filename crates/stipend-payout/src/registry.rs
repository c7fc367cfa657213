//! Account resolution.
//!
//! Configuration entries are validated once and turned into immutable
//! [`Account`] values. The custodian is registered like any other account
//! with a ratio of zero and itself as custodian, so its payout sends the
//! whole claimed balance back to its own address.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use stipend_crypto::key::SigningKey;
use stipend_types::Address;
use zeroize::Zeroizing;

use crate::{PayoutError, Result};

/// Parts per million in a ratio of one.
pub const PPM_SCALE: u32 = 1_000_000;

/// Share of a payout that goes to the account holder, in parts per million.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayoutRatio(u32);

impl PayoutRatio {
    /// Everything to the custodian.
    pub const ZERO: PayoutRatio = PayoutRatio(0);

    /// Everything to the account holder.
    pub const ONE: PayoutRatio = PayoutRatio(PPM_SCALE);

    /// Ratio from parts per million.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidAccount`] if `ppm` exceeds one million
    pub fn from_ppm(ppm: u32) -> Result<Self> {
        if ppm > PPM_SCALE {
            return Err(PayoutError::InvalidAccount(format!(
                "payout ratio {ppm} ppm exceeds 1"
            )));
        }
        Ok(Self(ppm))
    }

    /// Ratio from a decimal fraction, rounded to the nearest ppm.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidAccount`] if `fraction` is not finite or
    ///   lies outside `[0, 1]`
    pub fn from_fraction(fraction: f64) -> Result<Self> {
        if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
            return Err(PayoutError::InvalidAccount(format!(
                "payout ratio {fraction} outside [0, 1]"
            )));
        }
        Self::from_ppm((fraction * f64::from(PPM_SCALE)).round() as u32)
    }

    /// Parts per million.
    pub fn ppm(&self) -> u32 {
        self.0
    }

    /// Whether this is the self-payout ratio.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// As a decimal fraction.
    pub fn as_fraction(&self) -> f64 {
        f64::from(self.0) / f64::from(PPM_SCALE)
    }
}

impl fmt::Display for PayoutRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_fraction())
    }
}

/// An account entry as written in configuration.
#[derive(Clone)]
pub struct AccountSpec {
    /// Display name.
    pub name: String,
    /// Account address, `0x` or `ronin:` form.
    pub address: String,
    /// Hex private key.
    pub private_key: Zeroizing<String>,
    /// Account holder share in `[0, 1]`.
    pub payout_ratio: f64,
    /// Where the account holder share is sent. Required when the ratio is
    /// above zero.
    pub holder_address: Option<String>,
}

impl fmt::Debug for AccountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountSpec")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("payout_ratio", &self.payout_ratio)
            .field("holder_address", &self.holder_address)
            .finish_non_exhaustive()
    }
}

/// A resolved account. Never mutated after construction.
#[derive(Debug)]
pub struct Account {
    name: String,
    signing_key: SigningKey,
    payout_ratio: PayoutRatio,
    custodian: Address,
    holder_address: Option<Address>,
}

impl Account {
    /// Build an account around `signing_key`. Its address is derived from
    /// the key.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidAccount`] if the ratio is above zero and no
    ///   holder address is given, or an address is zero
    pub fn new(
        name: impl Into<String>,
        signing_key: SigningKey,
        payout_ratio: PayoutRatio,
        custodian: Address,
        holder_address: Option<Address>,
    ) -> Result<Self> {
        let name = name.into();
        if custodian.is_zero() {
            return Err(PayoutError::InvalidAccount(format!(
                "{name}: custodian address is zero"
            )));
        }
        let holder_address = if payout_ratio.is_zero() {
            None
        } else {
            match holder_address {
                Some(addr) if !addr.is_zero() => Some(addr),
                _ => {
                    return Err(PayoutError::InvalidAccount(format!(
                        "{name}: payout ratio {payout_ratio} needs a holder address"
                    )))
                }
            }
        };
        Ok(Self {
            name,
            signing_key,
            payout_ratio,
            custodian,
            holder_address,
        })
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// On-chain address controlled by the signing key.
    pub fn address(&self) -> Address {
        self.signing_key.address()
    }

    /// Signing credential.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Account holder share.
    pub fn payout_ratio(&self) -> PayoutRatio {
        self.payout_ratio
    }

    /// Receiver of the custodian share.
    pub fn custodian(&self) -> Address {
        self.custodian
    }

    /// Receiver of the account holder share; `None` for self-payout.
    pub fn holder_address(&self) -> Option<Address> {
        self.holder_address
    }

    /// Whether this is the custodian's own account.
    pub fn is_custodian(&self) -> bool {
        self.address() == self.custodian
    }
}

/// The set of accounts the engine operates on.
#[derive(Debug)]
pub struct AccountRegistry {
    accounts: Vec<Arc<Account>>,
}

impl AccountRegistry {
    /// Validate configuration entries and build the registry. The custodian
    /// comes first, then `accounts` in order.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidAccount`] on an unparseable address or key,
    ///   a key that does not control the configured address, a ratio outside
    ///   `[0, 1]`, a missing holder address, or a duplicate address
    pub fn resolve(custodian: &AccountSpec, accounts: &[AccountSpec]) -> Result<Self> {
        let custodian_address = parse_address(&custodian.name, "address", &custodian.address)?;
        let custodian_key = parse_key(custodian, custodian_address)?;
        let custodian_account = Account::new(
            custodian.name.clone(),
            custodian_key,
            PayoutRatio::ZERO,
            custodian_address,
            None,
        )?;

        let mut resolved = vec![Arc::new(custodian_account)];
        for spec in accounts {
            let address = parse_address(&spec.name, "address", &spec.address)?;
            let key = parse_key(spec, address)?;
            let ratio = PayoutRatio::from_fraction(spec.payout_ratio)
                .map_err(|e| PayoutError::InvalidAccount(format!("{}: {e}", spec.name)))?;
            let holder = spec
                .holder_address
                .as_deref()
                .map(|raw| parse_address(&spec.name, "holder_address", raw))
                .transpose()?;
            resolved.push(Arc::new(Account::new(
                spec.name.clone(),
                key,
                ratio,
                custodian_address,
                holder,
            )?));
        }

        Self::from_accounts(resolved)
    }

    /// Build a registry from already constructed accounts. The first entry
    /// is treated as the custodian.
    ///
    /// # Errors
    ///
    /// - [`PayoutError::InvalidAccount`] if `accounts` is empty or two
    ///   accounts share an address or name
    pub fn from_accounts(accounts: Vec<Arc<Account>>) -> Result<Self> {
        if accounts.is_empty() {
            return Err(PayoutError::InvalidAccount(
                "no custodian account".to_string(),
            ));
        }
        let mut addresses = HashSet::new();
        let mut names = HashSet::new();
        for account in &accounts {
            if !addresses.insert(account.address()) {
                return Err(PayoutError::InvalidAccount(format!(
                    "duplicate account address {}",
                    account.address()
                )));
            }
            if !names.insert(account.name().to_string()) {
                return Err(PayoutError::InvalidAccount(format!(
                    "duplicate account name {}",
                    account.name()
                )));
            }
        }
        tracing::debug!(count = accounts.len(), "account registry resolved");
        Ok(Self { accounts })
    }

    /// The custodian's own account.
    pub fn custodian(&self) -> &Arc<Account> {
        &self.accounts[0]
    }

    /// All accounts in registration order, custodian first.
    pub fn accounts(&self) -> &[Arc<Account>] {
        &self.accounts
    }

    /// Look up by address.
    pub fn by_address(&self, address: &Address) -> Option<&Arc<Account>> {
        self.accounts.iter().find(|a| &a.address() == address)
    }

    /// Look up by display name, ignoring ASCII case.
    pub fn by_name(&self, name: &str) -> Option<&Arc<Account>> {
        self.accounts
            .iter()
            .find(|a| a.name().eq_ignore_ascii_case(name))
    }

    /// Look up by display name, or by address in `0x` or `ronin:` form.
    pub fn lookup(&self, key: &str) -> Option<&Arc<Account>> {
        self.by_name(key).or_else(|| {
            key.trim()
                .parse::<Address>()
                .ok()
                .and_then(|address| self.by_address(&address))
        })
    }
}

fn parse_address(name: &str, field: &str, raw: &str) -> Result<Address> {
    let address: Address = raw
        .trim()
        .parse()
        .map_err(|e| PayoutError::InvalidAccount(format!("{name}: bad {field} {raw:?}: {e}")))?;
    if address.is_zero() {
        return Err(PayoutError::InvalidAccount(format!(
            "{name}: {field} is the zero address"
        )));
    }
    Ok(address)
}

fn parse_key(spec: &AccountSpec, expected: Address) -> Result<SigningKey> {
    let key = SigningKey::from_hex(&spec.private_key)
        .map_err(|e| PayoutError::InvalidAccount(format!("{}: {e}", spec.name)))?;
    if key.address() != expected {
        return Err(PayoutError::InvalidAccount(format!(
            "{}: private key controls {}, not {expected}",
            spec.name,
            key.address()
        )));
    }
    Ok(key)
}
