//! HTTP implementation of [`RewardLedger`].
//!
//! Balance and claim endpoints are REST (`{api_url}clients/{address}/items/1`);
//! login goes through the game's GraphQL endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use stipend_types::Address;

use crate::{AccessToken, BalanceInfo, ClaimAuthorization, LedgerError, Result, RewardLedger};

const CREATE_RANDOM_MESSAGE: &str = "mutation CreateRandomMessage {\n  createRandomMessage\n}\n";

const CREATE_ACCESS_TOKEN: &str = "mutation CreateAccessTokenWithSignature($input: SignatureInput!) {  createAccessTokenWithSignature(input: $input) {    newAccount    result    accessToken    __typename  }}";

/// Longest response body kept in error messages.
const MAX_ERROR_BODY: usize = 256;

/// Reward service client over HTTPS.
pub struct HttpRewardLedger {
    client: reqwest::Client,
    api_url: String,
    graphql_url: String,
}

impl HttpRewardLedger {
    /// Create a client. `api_url` is the REST base, `graphql_url` the login
    /// endpoint.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Unavailable`] if the HTTP client cannot be built
    pub fn new(
        api_url: impl Into<String>,
        graphql_url: impl Into<String>,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("stipend/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;

        let mut api_url = api_url.into();
        if !api_url.ends_with('/') {
            api_url.push('/');
        }

        Ok(Self {
            client,
            api_url,
            graphql_url: graphql_url.into(),
        })
    }

    fn item_url(&self, address: &Address) -> String {
        format!("{}clients/{address}/items/1", self.api_url)
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        if !status.is_success() {
            return Err(LedgerError::Rejected {
                status: status.as_u16(),
                body: truncate(&text),
            });
        }
        serde_json::from_str(&text)
            .map_err(|e| LedgerError::Unavailable(format!("malformed response: {e}")))
    }

    async fn graphql(&self, body: Value) -> Result<Value> {
        let response = self
            .client
            .post(&self.graphql_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        Self::read_json(response).await
    }
}

#[async_trait]
impl RewardLedger for HttpRewardLedger {
    async fn balance_info(&self, address: &Address) -> Result<BalanceInfo> {
        let response = self
            .client
            .get(self.item_url(address))
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let value = Self::read_json(response).await?;
        parse_balance_info(value)
    }

    async fn create_random_message(&self) -> Result<String> {
        let body = serde_json::json!({
            "operationName": "CreateRandomMessage",
            "variables": {},
            "query": CREATE_RANDOM_MESSAGE,
        });
        let value = self.graphql(body).await?;
        graphql_string(&value, &["data", "createRandomMessage"])
    }

    async fn create_access_token(
        &self,
        owner: &Address,
        message: &str,
        signature_hex: &str,
    ) -> Result<String> {
        let body = serde_json::json!({
            "operationName": "CreateAccessTokenWithSignature",
            "variables": {
                "input": {
                    "mainnet": "ronin",
                    "owner": owner.to_string(),
                    "message": message,
                    "signature": signature_hex,
                }
            },
            "query": CREATE_ACCESS_TOKEN,
        });
        let value = self.graphql(body).await?;
        graphql_string(
            &value,
            &["data", "createAccessTokenWithSignature", "accessToken"],
        )
        .map_err(|_| LedgerError::Session(format!("login rejected for {owner}")))
    }

    async fn request_claim(&self, token: &AccessToken) -> Result<Option<ClaimAuthorization>> {
        let url = format!("{}/claim", self.item_url(&token.owner()));
        let response = self
            .client
            .post(url)
            .bearer_auth(token.bearer())
            .send()
            .await
            .map_err(|e| LedgerError::Unavailable(e.to_string()))?;
        let value = Self::read_json(response).await?;
        parse_claim_response(&value)
    }
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}

/// Decode a balance record.
pub(crate) fn parse_balance_info(value: Value) -> Result<BalanceInfo> {
    if value.is_null() {
        return Err(LedgerError::Unavailable("empty balance record".to_string()));
    }
    serde_json::from_value(value)
        .map_err(|e| LedgerError::Unavailable(format!("malformed balance record: {e}")))
}

/// Follow `path` through a GraphQL response to a non-empty string.
pub(crate) fn graphql_string(value: &Value, path: &[&str]) -> Result<String> {
    if let Some(errors) = value.get("errors").filter(|e| !e.is_null()) {
        return Err(LedgerError::Unavailable(format!("graphql errors: {errors}")));
    }
    let mut cursor = value;
    for key in path {
        cursor = cursor.get(key).ok_or_else(|| {
            LedgerError::Unavailable(format!("graphql response missing `{key}`"))
        })?;
    }
    cursor
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| LedgerError::Unavailable(format!("graphql `{}` is not a string", path.join("."))))
}

/// Decode the claim endpoint's answer. A `null` signature means nothing
/// is claimable.
pub(crate) fn parse_claim_response(value: &Value) -> Result<Option<ClaimAuthorization>> {
    let chain = value.get("blockchain_related").ok_or_else(|| {
        LedgerError::Unavailable("claim response missing blockchain_related".to_string())
    })?;
    let payload = match chain.get("signature") {
        None | Some(Value::Null) => return Ok(None),
        Some(payload) => payload,
    };

    let amount = payload
        .get("amount")
        .and_then(Value::as_u64)
        .ok_or_else(|| LedgerError::Unavailable("claim payload missing amount".to_string()))?;
    let timestamp = payload
        .get("timestamp")
        .and_then(Value::as_u64)
        .ok_or_else(|| LedgerError::Unavailable("claim payload missing timestamp".to_string()))?;
    let signature_hex = payload
        .get("signature")
        .and_then(Value::as_str)
        .ok_or_else(|| LedgerError::Unavailable("claim payload missing signature".to_string()))?;
    let signature = hex::decode(signature_hex.trim_start_matches("0x"))
        .map_err(|e| LedgerError::Unavailable(format!("claim signature not hex: {e}")))?;

    if amount == 0 {
        return Ok(None);
    }

    Ok(Some(ClaimAuthorization {
        amount,
        timestamp,
        signature,
    }))
}
