//! EIP-155 legacy transactions.
//!
//! Ronin accepts pre-EIP-1559 transactions and its free-gas RPC expects a
//! zero gas price. Transactions are built as alloy [`TxLegacy`] values,
//! signed locally with the account key and submitted as raw bytes.

use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::primitives::{Bytes, TxKind, U256};
use stipend_crypto::key::SigningKey;
use stipend_types::{Address, TxHash};

use crate::{alloy_address, Result};

/// An unsigned legacy transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTransaction {
    /// Sender's transaction count at submission time.
    pub nonce: u64,
    /// Gas price in wei.
    pub gas_price: u64,
    /// Gas limit.
    pub gas_limit: u64,
    /// Recipient (the token contract for all calls made here).
    pub to: Address,
    /// Native value transferred, in wei.
    pub value: u64,
    /// Calldata.
    pub data: Vec<u8>,
    /// EIP-155 chain id.
    pub chain_id: u64,
}

/// A signed transaction ready for `eth_sendRawTransaction`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignedTransaction {
    /// RLP-encoded signed transaction.
    pub raw: Vec<u8>,
    /// Transaction hash.
    pub hash: TxHash,
    /// Nonce slot this transaction occupies.
    pub nonce: u64,
}

impl LegacyTransaction {
    fn to_alloy(&self) -> TxLegacy {
        TxLegacy {
            chain_id: Some(self.chain_id),
            nonce: self.nonce,
            gas_price: u128::from(self.gas_price),
            gas_limit: self.gas_limit,
            to: TxKind::Call(alloy_address(&self.to)),
            value: U256::from(self.value),
            input: Bytes::from(self.data.clone()),
        }
    }

    /// Digest the sender signs.
    pub fn signing_hash(&self) -> [u8; 32] {
        self.to_alloy().signature_hash().0
    }

    /// Sign with `key`, producing the raw bytes and transaction hash.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Signing`](crate::ChainError::Signing) if ECDSA signing fails
    pub fn sign(&self, key: &SigningKey) -> Result<SignedTransaction> {
        let mut tx = self.to_alloy();
        let signature = key.sign_transaction(&mut tx)?;
        let signed = tx.into_signed(signature);
        let hash = TxHash::from_bytes(signed.hash().0);
        let raw = TxEnvelope::from(signed).encoded_2718();

        Ok(SignedTransaction {
            raw,
            hash,
            nonce: self.nonce,
        })
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::keccak256;

    use super::*;

    /// The worked example from EIP-155.
    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Address::from_bytes([0x35; 20]),
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
            chain_id: 1,
        }
    }

    #[test]
    fn test_eip155_signing_hash() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_eip155_signed_raw() {
        let key = SigningKey::from_slice(&[0x46; 32]).expect("key");
        let signed = eip155_example().sign(&key).expect("sign");
        assert_eq!(
            hex::encode(&signed.raw),
            concat!(
                "f86c098504a817c800825208943535353535353535353535353535353535353535",
                "880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c",
                "71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc",
                "64214b297fb1966a3b6d83",
            )
        );
        assert_eq!(
            signed.hash.to_string(),
            "0x33469b22e9f636356c4160a87eb19df52b7412e8eac32a4a55ffe88ea8350788"
        );
        assert_eq!(signed.nonce, 9);
    }

    #[test]
    fn test_ronin_transfer_signs_with_zero_gas_price() {
        let key = SigningKey::generate();
        let tx = LegacyTransaction {
            nonce: 0,
            gas_price: 0,
            gas_limit: 100_000,
            to: Address::from_bytes([0xa8; 20]),
            value: 0,
            data: crate::calls::encode_transfer(&Address::from_bytes([0x01; 20]), 5),
            chain_id: 2020,
        };
        let signed = tx.sign(&key).expect("sign");
        assert_eq!(signed.hash.as_bytes(), &keccak256(&signed.raw).0);
        // Long list prefix: payload exceeds 55 bytes.
        assert_eq!(signed.raw[0], 0xf8);
    }
}
