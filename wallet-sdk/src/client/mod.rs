//! HTTP client for the wallet API.
//!
//! Gated behind the `client` cargo feature so downstream crates that only
//! need the shared types do not pull in `reqwest`.

use reqwest::{Client, StatusCode};
use url::Url;
use uuid::Uuid;

use crate::ACCOUNT_ID_HEADER;
use crate::objects::{
    ApiResponse, PaymentRequest, TopUpRequest, TransactionDetailsResponse, TransactionResponse,
    TransferRequest,
};

/// Errors produced by [`WalletClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("api error: status {status}, body: {body}")]
    Api { status: StatusCode, body: String },

    /// Response body could not be deserialized.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The base URL could not be joined with the endpoint path.
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

/// Typed HTTP client acting on behalf of one account.
///
/// Every request carries the `X-Account-Id` header. The client is meant to
/// sit behind the same gateway that would normally set that header.
#[derive(Debug, Clone)]
pub struct WalletClient {
    http: Client,
    base_url: Url,
    account_id: Uuid,
}

impl WalletClient {
    pub fn new(base_url: Url, account_id: Uuid) -> Self {
        Self {
            http: Client::new(),
            base_url,
            account_id,
        }
    }

    /// Replace the default `reqwest::Client` with a custom one.
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    /// `POST /api/v1/topup`
    pub async fn top_up(&self, amount: i64) -> Result<TransactionResponse, ClientError> {
        let url = self.base_url.join("/api/v1/topup")?;
        let resp = self
            .http
            .post(url)
            .header(ACCOUNT_ID_HEADER, self.account_id.to_string())
            .json(&TopUpRequest { amount })
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/pay`
    pub async fn pay(
        &self,
        amount: i64,
        remarks: impl Into<String>,
    ) -> Result<TransactionResponse, ClientError> {
        let url = self.base_url.join("/api/v1/pay")?;
        let resp = self
            .http
            .post(url)
            .header(ACCOUNT_ID_HEADER, self.account_id.to_string())
            .json(&PaymentRequest {
                amount,
                remarks: remarks.into(),
            })
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `POST /api/v1/transfer`
    ///
    /// The returned record is `pending`; poll [`get_transaction`](Self::get_transaction)
    /// to observe settlement.
    pub async fn transfer(
        &self,
        target_user: Uuid,
        amount: i64,
        remarks: impl Into<String>,
    ) -> Result<TransactionResponse, ClientError> {
        let url = self.base_url.join("/api/v1/transfer")?;
        let resp = self
            .http
            .post(url)
            .header(ACCOUNT_ID_HEADER, self.account_id.to_string())
            .json(&TransferRequest {
                target_user,
                amount,
                remarks: remarks.into(),
            })
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/transactions`
    pub async fn list_transactions(
        &self,
    ) -> Result<Vec<TransactionDetailsResponse>, ClientError> {
        let url = self.base_url.join("/api/v1/transactions")?;
        let resp = self
            .http
            .get(url)
            .header(ACCOUNT_ID_HEADER, self.account_id.to_string())
            .send()
            .await?;
        parse_response(resp).await
    }

    /// `GET /api/v1/transactions/{transaction_id}`
    pub async fn get_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<TransactionDetailsResponse, ClientError> {
        let url = self
            .base_url
            .join(&format!("/api/v1/transactions/{transaction_id}"))?;
        let resp = self
            .http
            .get(url)
            .header(ACCOUNT_ID_HEADER, self.account_id.to_string())
            .send()
            .await?;
        parse_response(resp).await
    }
}

async fn parse_response<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ClientError> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ClientError::Api { status, body });
    }
    let bytes = resp.bytes().await?;
    let envelope: ApiResponse<T> = serde_json::from_slice(&bytes)?;
    Ok(envelope.result)
}
