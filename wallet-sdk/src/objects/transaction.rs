//! Transaction API request and response types.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::macros::format_description;
use uuid::Uuid;

/// Direction of a balance movement.
///
/// `Debit` increases the owner's balance (top-up), `Credit` decreases it
/// (payment, outgoing transfer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Debit,
    Credit,
}

/// Lifecycle status of a transaction record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    /// A transfer that has been accepted but not yet settled.
    Pending,
    Success,
}

/// `POST /api/v1/topup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopUpRequest {
    pub amount: i64,
}

/// `POST /api/v1/pay`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub amount: i64,
    #[serde(default)]
    pub remarks: String,
}

/// `POST /api/v1/transfer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub target_user: Uuid,
    pub amount: i64,
    #[serde(default)]
    pub remarks: String,
}

/// Short form returned by the mutating endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: Uuid,
    pub amount: i64,
    pub balance_before: i64,
    /// For a pending transfer this is the projected balance computed when the
    /// transfer was accepted, not a settled value.
    pub balance_after: i64,
    pub status: TransactionStatus,
    pub created_at: String,
}

/// Full form returned by the history endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDetailsResponse {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub remarks: String,
    pub balance_before: i64,
    pub balance_after: i64,
    pub status: TransactionStatus,
    pub created_at: String,
}

/// Render a timestamp as `YYYY-MM-DD hh:mm:ss` in UTC.
pub fn format_timestamp(at: OffsetDateTime) -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    at.to_offset(time::UtcOffset::UTC)
        .format(&format)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
