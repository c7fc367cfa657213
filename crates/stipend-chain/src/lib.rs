//! # stipend-chain
//!
//! Ronin chain access: contract calls, transaction signing, submission
//! through an alloy provider and receipt polling.
//!
//! ## Modules
//!
//! - [`calls`] - `sol!` bindings and calldata for the SLP token
//! - [`tx`] - EIP-155 legacy transactions
//! - [`rpc`] - [`ChainRpc`](rpc::ChainRpc) trait and the provider-backed client
//! - [`confirm`] - Receipt polling until a transaction is final

pub mod calls;
pub mod confirm;
pub mod rpc;
pub mod tx;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use stipend_types::{Address, TxHash};

/// Error types for chain operations.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The node could not be reached or the HTTP exchange failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node.
        message: String,
    },

    /// The node answered with something we cannot interpret.
    #[error("invalid rpc response: {0}")]
    InvalidResponse(String),

    /// Transaction signing failed.
    #[error("signing error: {0}")]
    Signing(#[from] stipend_crypto::CryptoError),

    /// Waiting for a receipt stopped before the transaction became final.
    #[error("confirmation of {hash} aborted: {reason}")]
    ConfirmationAborted {
        /// The transaction being waited on.
        hash: TxHash,
        /// Why the wait stopped.
        reason: confirm::AbortReason,
    },
}

/// Convenience result type for chain operations.
pub type Result<T> = std::result::Result<T, ChainError>;

/// Chain parameters shared by every transaction this system builds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Token contract receiving `transfer` and `checkpoint` calls.
    pub token_contract: Address,
    /// Gas limit for claim (`checkpoint`) transactions.
    pub claim_gas_limit: u64,
    /// Gas limit for token transfers.
    pub transfer_gas_limit: u64,
    /// Gas price in wei. Ronin's free-gas RPC expects zero.
    pub gas_price: u64,
}

impl ChainParams {
    /// Ronin mainnet parameters for the SLP token.
    pub fn ronin_slp() -> Self {
        Self {
            chain_id: stipend_types::RONIN_CHAIN_ID,
            token_contract: Address::from_bytes(SLP_CONTRACT_BYTES),
            claim_gas_limit: 1_000_000,
            transfer_gas_limit: 100_000,
            gas_price: 0,
        }
    }
}

const SLP_CONTRACT_BYTES: [u8; 20] = [
    0xa8, 0x75, 0x4b, 0x9f, 0xa1, 0x5f, 0xc1, 0x8b, 0xb5, 0x94, 0x58, 0x81, 0x55, 0x10, 0xe4, 0x0a,
    0x12, 0xcd, 0x20, 0x14,
];

/// alloy's form of `address`.
pub(crate) fn alloy_address(address: &Address) -> alloy::primitives::Address {
    alloy::primitives::Address::from(*address.as_bytes())
}

/// Default receipt poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ronin_params_match_contract_constant() {
        let params = ChainParams::ronin_slp();
        assert_eq!(params.token_contract.to_string(), stipend_types::SLP_CONTRACT);
        assert_eq!(params.chain_id, 2020);
        assert_eq!(params.gas_price, 0);
    }
}
