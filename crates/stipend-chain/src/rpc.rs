//! Access to a Ronin node.
//!
//! [`ChainRpc`] is the seam between the executors and the network; the
//! workflow crates depend only on the trait, tests substitute in-memory
//! implementations.

use std::time::Duration;

use alloy::network::ReceiptResponse;
use alloy::primitives::B256;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::transports::http::reqwest::{Client, Url};
use alloy::transports::http::Http;
use alloy::transports::{RpcError, TransportError};
use async_trait::async_trait;
use stipend_types::{Address, TxHash};

use crate::tx::SignedTransaction;
use crate::{alloy_address, ChainError, Result};

/// Final execution record of a mined transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction hash.
    pub hash: TxHash,
    /// Execution status flag (`status == 0x1`).
    pub success: bool,
    /// Block the transaction was included in, when reported.
    pub block_number: Option<u64>,
}

/// Chain operations the claim and payout workflows need.
#[async_trait]
pub trait ChainRpc: Send + Sync {
    /// Transaction count (next nonce) of `address`.
    async fn transaction_count(&self, address: &Address) -> Result<u64>;

    /// Submit a signed transaction. Returns the hash reported by the node.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash>;

    /// Receipt of `hash`, or `None` if the node does not know it yet.
    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>>;
}

/// Submit `signed` and return its hash once the node has accepted it.
///
/// A node that reports the transaction as already known has accepted it
/// earlier; that counts as success. Any other failure means the nonce slot
/// was not consumed.
///
/// # Errors
///
/// - [`ChainError::Transport`] / [`ChainError::Rpc`] if the node did not
///   accept the transaction
pub async fn submit_signed(rpc: &dyn ChainRpc, signed: &SignedTransaction) -> Result<TxHash> {
    match rpc.send_raw_transaction(&signed.raw).await {
        Ok(reported) => {
            if reported != signed.hash {
                tracing::warn!(
                    local = %signed.hash,
                    reported = %reported,
                    "node reported a different transaction hash"
                );
            }
            Ok(signed.hash)
        }
        Err(ChainError::Rpc { message, .. }) if is_already_known(&message) => {
            tracing::info!(hash = %signed.hash, "transaction already known to node");
            Ok(signed.hash)
        }
        Err(e) => Err(e),
    }
}

fn is_already_known(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("already known") || lower.contains("known transaction")
}

/// [`ChainRpc`] over an alloy HTTP provider.
#[derive(Clone)]
pub struct ProviderRpc {
    provider: DynProvider,
}

impl ProviderRpc {
    /// Connect to the node at `url`. Every request is bounded by
    /// `request_timeout`.
    ///
    /// # Errors
    ///
    /// - [`ChainError::Transport`] if the URL is malformed or the HTTP
    ///   client cannot be built
    pub fn connect(url: &str, request_timeout: Duration) -> Result<Self> {
        let parsed: Url = url
            .parse()
            .map_err(|e| ChainError::Transport(format!("invalid rpc url {url}: {e}")))?;
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ChainError::Transport(e.to_string()))?;
        let rpc = RpcClient::new(Http::with_client(client, parsed), false);
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_client(rpc)
            .erased();
        Ok(Self::from_provider(provider))
    }

    /// Wrap an already configured provider.
    pub fn from_provider(provider: DynProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl ChainRpc for ProviderRpc {
    async fn transaction_count(&self, address: &Address) -> Result<u64> {
        tracing::debug!(%address, "eth_getTransactionCount");
        self.provider
            .get_transaction_count(alloy_address(address))
            .await
            .map_err(transport_error)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash> {
        tracing::debug!(len = raw.len(), "eth_sendRawTransaction");
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(transport_error)?;
        Ok(TxHash::from_bytes(pending.tx_hash().0))
    }

    async fn transaction_receipt(&self, hash: &TxHash) -> Result<Option<Receipt>> {
        tracing::debug!(%hash, "eth_getTransactionReceipt");
        let receipt = self
            .provider
            .get_transaction_receipt(B256::from(*hash.as_bytes()))
            .await
            .map_err(transport_error)?;
        Ok(receipt.map(|r| Receipt {
            hash: TxHash::from_bytes(r.transaction_hash().0),
            success: r.status(),
            block_number: r.block_number(),
        }))
    }
}

/// Classify a provider error. Node-reported JSON-RPC errors keep their
/// code and message so callers can recognise "already known".
pub(crate) fn transport_error(e: TransportError) -> ChainError {
    match &e {
        RpcError::ErrorResp(payload) => ChainError::Rpc {
            code: payload.code,
            message: payload.message.to_string(),
        },
        RpcError::NullResp | RpcError::DeserError { .. } => {
            ChainError::InvalidResponse(e.to_string())
        }
        _ => ChainError::Transport(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use alloy::rpc::json_rpc::ErrorPayload;
    use alloy::transports::TransportErrorKind;

    use super::*;

    #[test]
    fn test_node_error_keeps_code_and_message() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"code":-32000,"message":"nonce too low"}"#).expect("payload");
        let err = transport_error(RpcError::ErrorResp(payload));
        assert!(matches!(
            err,
            ChainError::Rpc { code: -32000, ref message } if message == "nonce too low"
        ));
    }

    #[test]
    fn test_null_response_is_invalid() {
        assert!(matches!(
            transport_error(RpcError::NullResp),
            ChainError::InvalidResponse(_)
        ));
    }

    #[test]
    fn test_connection_failure_is_transport() {
        let err = transport_error(TransportErrorKind::custom_str("connection refused"));
        assert!(matches!(err, ChainError::Transport(_)));
    }

    #[test]
    fn test_connect_rejects_malformed_url() {
        assert!(matches!(
            ProviderRpc::connect("not a url", Duration::from_secs(1)),
            Err(ChainError::Transport(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_builds_client() {
        assert!(ProviderRpc::connect("http://127.0.0.1:8545", Duration::from_secs(1)).is_ok());
    }

    #[test]
    fn test_already_known_detection() {
        assert!(is_already_known("already known"));
        assert!(is_already_known("Known transaction: 0xabc"));
        assert!(!is_already_known("nonce too low"));
    }
}
