use axum::{
    Json,
    extract::{Path, State},
};
use uuid::Uuid;
use wallet_core::entities::Amount;
use wallet_sdk::objects::{
    ApiResponse, PaymentRequest, TopUpRequest, TransactionDetailsResponse, TransactionResponse,
    TransferRequest,
};

use super::ApiError;
use super::extractors::{AuthenticatedAccount, JsonBody};
use crate::state::AppState;

fn amount(value: i64) -> Result<Amount, ApiError> {
    Amount::new(value).map_err(|_| ApiError::InvalidAmount)
}

/// `POST /topup`
pub(super) async fn top_up(
    State(state): State<AppState>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    JsonBody(payload): JsonBody<TopUpRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let amount = amount(payload.amount)?;
    let record = state.service.process_top_up(account_id, amount).await?;
    Ok(Json(ApiResponse::success(record.to_response())))
}

/// `POST /pay`
pub(super) async fn pay(
    State(state): State<AppState>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    JsonBody(payload): JsonBody<PaymentRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let amount = amount(payload.amount)?;
    let record = state
        .service
        .process_payment(account_id, amount, payload.remarks)
        .await?;
    Ok(Json(ApiResponse::success(record.to_response())))
}

/// `POST /transfer`
///
/// Responds as soon as the transfer is accepted. The record in the response
/// is `pending`.
pub(super) async fn transfer(
    State(state): State<AppState>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    JsonBody(payload): JsonBody<TransferRequest>,
) -> Result<Json<ApiResponse<TransactionResponse>>, ApiError> {
    let amount = amount(payload.amount)?;
    let record = state
        .service
        .process_transfer(account_id, payload.target_user, amount, payload.remarks)
        .await?;
    Ok(Json(ApiResponse::success(record.to_response())))
}

/// `GET /transactions`
pub(super) async fn list_transactions(
    State(state): State<AppState>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
) -> Result<Json<ApiResponse<Vec<TransactionDetailsResponse>>>, ApiError> {
    let records = state.service.get_all_transactions(account_id).await?;
    let result = records.iter().map(|r| r.to_details_response()).collect();
    Ok(Json(ApiResponse::success(result)))
}

/// `GET /transactions/{transaction_id}`
pub(super) async fn get_transaction(
    State(state): State<AppState>,
    AuthenticatedAccount(account_id): AuthenticatedAccount,
    Path(transaction_id): Path<Uuid>,
) -> Result<Json<ApiResponse<TransactionDetailsResponse>>, ApiError> {
    let record = state
        .service
        .get_transaction(account_id, transaction_id)
        .await?;
    Ok(Json(ApiResponse::success(record.to_details_response())))
}
