//! Wallet API handlers.
//!
//! Every endpoint acts on the account named by the `X-Account-Id` header.
//!
//! # Endpoints
//!
//! - `POST /topup`                         – add funds
//! - `POST /pay`                           – spend funds
//! - `POST /transfer`                      – accept a transfer for settlement
//! - `GET  /transactions`                  – full history, oldest first
//! - `GET  /transactions/{transaction_id}` – one record, e.g. to poll a pending transfer

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use thiserror::Error;
use wallet_core::services::TransactionError;
use wallet_sdk::objects::ErrorResponse;

use crate::state::AppState;

pub mod extractors;
mod transactions;

/// Build the wallet API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/topup", post(transactions::top_up))
        .route("/pay", post(transactions::pay))
        .route("/transfer", post(transactions::transfer))
        .route("/transactions", get(transactions::list_transactions))
        .route(
            "/transactions/{transaction_id}",
            get(transactions::get_transaction),
        )
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in wallet API handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing X-Account-Id header")]
    MissingAccount,

    #[error("invalid X-Account-Id header")]
    InvalidAccount,

    /// Amount was zero or negative.
    #[error("invalid amount")]
    InvalidAmount,

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::MissingAccount | ApiError::InvalidAccount => StatusCode::UNAUTHORIZED,
            ApiError::InvalidAmount => StatusCode::BAD_REQUEST,
            ApiError::Transaction(e) => match e {
                TransactionError::AccountNotFound(_)
                | TransactionError::TargetNotFound(_)
                | TransactionError::TransactionNotFound(_) => StatusCode::NOT_FOUND,
                TransactionError::InsufficientBalance { .. }
                | TransactionError::SelfTransfer
                | TransactionError::BalanceOverflow(_) => StatusCode::UNPROCESSABLE_ENTITY,
                TransactionError::Contention(_) => StatusCode::CONFLICT,
                TransactionError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Wallet API storage error");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorResponse::new(message))).into_response()
    }
}
