//! # stipend-types
//!
//! Shared domain types used across the stipend workspace.
//!
//! ## Modules
//!
//! - [`address`] - 20-byte chain addresses (`0x` / `ronin:` forms)
//! - [`balance`] - Reward ledger balances
//! - [`transaction`] - Transaction hashes and final status
//! - [`backoff`] - Retry/poll delay schedules

pub mod address;
pub mod backoff;
pub mod balance;
pub mod transaction;

pub use address::Address;
pub use backoff::Backoff;
pub use balance::Balance;
pub use transaction::{Transaction, TxHash, TxStatus};

/// Minimum interval between two claims for the same address (14 days).
pub const CLAIM_COOLDOWN_SECS: u64 = 14 * 24 * 3600;

/// Ronin mainnet chain id.
pub const RONIN_CHAIN_ID: u64 = 2020;

/// SLP token contract on Ronin. Both `transfer` and `checkpoint` live here.
pub const SLP_CONTRACT: &str = "0xa8754b9fa15fc18bb59458815510e40a12cd2014";

/// Error types for parsing shared values.
#[derive(Debug, thiserror::Error)]
pub enum TypesError {
    /// Hex string has the wrong number of bytes.
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength {
        /// Expected byte length.
        expected: usize,
        /// Actual byte length.
        actual: usize,
    },

    /// Not valid hex.
    #[error("invalid hex: {0}")]
    InvalidHex(String),
}

/// Convenience result type for shared value parsing.
pub type Result<T> = std::result::Result<T, TypesError>;

/// Decode a `0x`-prefixed (or bare) hex string into a fixed-size array.
pub(crate) fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N]> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    let bytes = hex::decode(digits).map_err(|e| TypesError::InvalidHex(e.to_string()))?;
    if bytes.len() != N {
        return Err(TypesError::InvalidLength {
            expected: N,
            actual: bytes.len(),
        });
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cooldown_is_fourteen_days() {
        assert_eq!(CLAIM_COOLDOWN_SECS, 1_209_600);
    }

    #[test]
    fn test_decode_fixed_rejects_wrong_length() {
        let err = decode_fixed::<4>("0x0102").expect_err("too short");
        assert!(matches!(
            err,
            TypesError::InvalidLength {
                expected: 4,
                actual: 2
            }
        ));
    }

    #[test]
    fn test_slp_contract_parses() {
        let addr: Address = SLP_CONTRACT.parse().expect("contract address");
        assert_eq!(addr.to_string(), SLP_CONTRACT);
    }
}
