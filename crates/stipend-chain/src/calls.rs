//! Contract calls made against the SLP token.
//!
//! Only two calls are needed:
//!
//! - `transfer(address,uint256)`
//! - `checkpoint(address,uint256,uint256,bytes)`, which mints previously
//!   earned rewards given a signature from the reward service

use alloy::primitives::{Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use stipend_types::Address;

use crate::alloy_address;

sol! {
    #[allow(missing_docs)]
    interface ISlpToken {
        /// Move `amount` tokens from the caller to `to`.
        function transfer(address to, uint256 amount) external returns (bool);

        /// Mint rewards the reward service has authorized for `owner`.
        function checkpoint(
            address owner,
            uint256 amount,
            uint256 createdAt,
            bytes signature
        ) external returns (uint256 balance);
    }
}

/// Selector of `transfer(address,uint256)`.
pub const TRANSFER_SELECTOR: [u8; 4] = ISlpToken::transferCall::SELECTOR;

/// Selector of `checkpoint(address,uint256,uint256,bytes)`.
pub const CHECKPOINT_SELECTOR: [u8; 4] = ISlpToken::checkpointCall::SELECTOR;

/// Calldata for `transfer(to, amount)`.
pub fn encode_transfer(to: &Address, amount: u64) -> Vec<u8> {
    ISlpToken::transferCall {
        to: alloy_address(to),
        amount: U256::from(amount),
    }
    .abi_encode()
}

/// Calldata for `checkpoint(owner, amount, created_at, signature)`.
pub fn encode_checkpoint(owner: &Address, amount: u64, created_at: u64, signature: &[u8]) -> Vec<u8> {
    ISlpToken::checkpointCall {
        owner: alloy_address(owner),
        amount: U256::from(amount),
        createdAt: U256::from(created_at),
        signature: Bytes::copy_from_slice(signature),
    }
    .abi_encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn test_selectors() {
        assert_eq!(hex::encode(ISlpToken::transferCall::SELECTOR), "a9059cbb");
        assert_eq!(ISlpToken::checkpointCall::SIGNATURE, "checkpoint(address,uint256,uint256,bytes)");
    }

    #[test]
    fn test_encode_transfer() {
        let data = encode_transfer(&addr(0x11), 900);
        assert_eq!(data.len(), 68);
        assert_eq!(
            hex::encode(&data),
            concat!(
                "a9059cbb",
                "0000000000000000000000001111111111111111111111111111111111111111",
                "0000000000000000000000000000000000000000000000000000000000000384",
            )
        );
    }

    #[test]
    fn test_encode_checkpoint_pads_signature() {
        let signature = [0xabu8; 65];
        let data = encode_checkpoint(&addr(0x22), 100, 1_700_000_000, &signature);
        // selector + 4 head words + length word + 3 words of signature
        assert_eq!(data.len(), 4 + 4 * 32 + 32 + 96);
        assert_eq!(&data[..4], &ISlpToken::checkpointCall::SELECTOR);
        assert_eq!(data[4 + 3 * 32 + 31], 0x80);
        assert_eq!(data[4 + 4 * 32 + 31], 65);
        assert_eq!(&data[4 + 5 * 32..4 + 5 * 32 + 65], &signature[..]);
        assert!(data[4 + 5 * 32 + 65..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_checkpoint_decodes_back() {
        let data = encode_checkpoint(&addr(0x22), 7, 9, &[1, 2, 3]);
        let call = ISlpToken::checkpointCall::abi_decode(&data).expect("decode");
        assert_eq!(call.owner, alloy_address(&addr(0x22)));
        assert_eq!(call.amount, U256::from(7u64));
        assert_eq!(call.createdAt, U256::from(9u64));
        assert_eq!(call.signature.as_ref(), &[1, 2, 3]);
    }
}
