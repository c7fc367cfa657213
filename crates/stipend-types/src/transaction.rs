//! Submitted transactions and their observed outcome.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};

use crate::{decode_fixed, TypesError};

/// Keccak-256 hash identifying a submitted transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Wrap raw hash bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for TxHash {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed::<32>(s.trim()).map(Self)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({self})")
    }
}

/// Lifecycle of a submitted transaction.
///
/// `Pending` moves to exactly one of the terminal states and never back.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    /// Submitted, no receipt observed yet.
    Pending,
    /// Receipt observed with a success status flag.
    Confirmed,
    /// Receipt observed with a failure status flag.
    Reverted,
}

impl TxStatus {
    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

/// A transaction hash together with its last observed status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction hash.
    pub hash: TxHash,
    /// Last observed status.
    pub status: TxStatus,
}

impl Transaction {
    /// A freshly submitted transaction.
    pub fn pending(hash: TxHash) -> Self {
        Self {
            hash,
            status: TxStatus::Pending,
        }
    }

    /// Record the terminal status observed from a receipt.
    ///
    /// Returns `false` (and leaves the status untouched) if the transaction
    /// was already final.
    pub fn settle(&mut self, status: TxStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        true
    }
}
