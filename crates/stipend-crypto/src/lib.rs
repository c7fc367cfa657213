//! # stipend-crypto
//!
//! Account signing credentials for Ronin transactions and reward service
//! login challenges, built on alloy's local secp256k1 signer.
//!
//! ## Modules
//!
//! - [`key`] - Account signing key, address derivation, transaction
//!   signing and EIP-191 personal messages

pub mod key;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Private key material is malformed or out of range.
    #[error("invalid private key: {0}")]
    InvalidKey(String),

    /// The signing primitive failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Signer recovery failed.
    #[error("signature recovery failed: {0}")]
    Recovery(String),
}

/// Convenience result type for cryptographic operations.
pub type Result<T> = std::result::Result<T, CryptoError>;
