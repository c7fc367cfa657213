//! Account signing keys.
//!
//! A Ronin account is controlled by a secp256k1 private key. [`SigningKey`]
//! wraps alloy's [`PrivateKeySigner`] and never exposes the secret through
//! `Debug` or `Display`; only the derived address is printable. The key
//! material is zeroized on drop by the underlying signer.

use alloy::consensus::SignableTransaction;
use alloy::network::TxSignerSync;
use alloy::primitives::Signature;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use stipend_types::Address;
use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// An account's private signing key.
#[derive(Clone)]
pub struct SigningKey {
    inner: PrivateKeySigner,
}

/// A 65-byte `r || s || v` signature over an EIP-191 personal message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PersonalSignature(Signature);

impl SigningKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    /// Parse a hex private key, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidKey`] if the input is not 32 bytes of hex or
    ///   is not a valid scalar
    pub fn from_hex(hex_key: &str) -> Result<Self> {
        let trimmed = hex_key.trim();
        let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = Zeroizing::new(
            hex::decode(digits).map_err(|_| CryptoError::InvalidKey("not valid hex".to_string()))?,
        );
        Self::from_slice(&bytes)
    }

    /// Create a key from 32 raw bytes.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::InvalidKey`] if the bytes are not a valid scalar
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CryptoError::InvalidKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let inner = PrivateKeySigner::from_slice(bytes)
            .map_err(|_| CryptoError::InvalidKey("scalar out of range".to_string()))?;
        Ok(Self { inner })
    }

    /// The account address controlled by this key.
    pub fn address(&self) -> Address {
        Address::from_bytes(self.inner.address().into_array())
    }

    /// Sign `tx` in place of its signature hash. Legacy transactions that
    /// carry a chain id are signed with EIP-155 replay protection.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Signing`] if the ECDSA primitive fails
    pub fn sign_transaction(&self, tx: &mut dyn SignableTransaction<Signature>) -> Result<Signature> {
        self.inner
            .sign_transaction_sync(tx)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }

    /// Sign `message` as an EIP-191 personal message.
    ///
    /// # Errors
    ///
    /// - [`CryptoError::Signing`] if the ECDSA primitive fails
    pub fn sign_personal_message(&self, message: &[u8]) -> Result<PersonalSignature> {
        self.inner
            .sign_message_sync(message)
            .map(PersonalSignature)
            .map_err(|e| CryptoError::Signing(e.to_string()))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}

impl PersonalSignature {
    /// `r || s || v` with `v` in `{27, 28}`.
    pub fn to_bytes(&self) -> [u8; 65] {
        self.0.as_bytes()
    }

    /// `0x`-prefixed hex, the form the reward service expects.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes()))
    }
}

/// Recover the address that signed `message` as a personal message.
///
/// # Errors
///
/// - [`CryptoError::Recovery`] if the signature is malformed or recovery fails
pub fn recover_personal_signer(message: &[u8], signature_hex: &str) -> Result<Address> {
    let signature: Signature = signature_hex
        .trim()
        .parse()
        .map_err(|e| CryptoError::Recovery(format!("{e}")))?;
    let signer = signature
        .recover_address_from_msg(message)
        .map_err(|e| CryptoError::Recovery(e.to_string()))?;
    Ok(Address::from_bytes(signer.into_array()))
}
