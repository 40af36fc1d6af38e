use crate::entities::{Amount, TransactionStatus, TransactionType};
use uuid::Uuid;
use wallet_sdk::objects::{TransactionDetailsResponse, TransactionResponse, format_timestamp};

/// An entry in an account's transaction history.
///
/// Every field except `status` is fixed at creation. Only a transfer is ever
/// created `Pending`; the settlement worker moves it to `Success`.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub transaction_type: TransactionType,
    pub amount: i64,
    pub remark: String,
    pub balance_before: i64,
    /// Balance after the movement. For a pending transfer this is a projection
    /// made when the transfer was accepted; the sender's balance is only
    /// debited at settlement.
    pub balance_after: i64,
    pub status: TransactionStatus,
    pub created_at: time::OffsetDateTime,
}

/// Remark stored on every top-up record.
pub const TOP_UP_REMARK: &str = "topup";

impl TransactionRecord {
    fn new(
        account_id: Uuid,
        transaction_type: TransactionType,
        amount: Amount,
        remark: String,
        balance_before: i64,
        status: TransactionStatus,
    ) -> Self {
        let balance_after = match transaction_type {
            TransactionType::Debit => balance_before + amount.get(),
            TransactionType::Credit => balance_before - amount.get(),
        };
        Self {
            id: Uuid::now_v7(),
            account_id,
            transaction_type,
            amount: amount.get(),
            remark,
            balance_before,
            balance_after,
            status,
            created_at: time::OffsetDateTime::now_utc(),
        }
    }

    /// A settled top-up.
    pub fn top_up(account_id: Uuid, amount: Amount, balance_before: i64) -> Self {
        Self::new(
            account_id,
            TransactionType::Debit,
            amount,
            TOP_UP_REMARK.to_string(),
            balance_before,
            TransactionStatus::Success,
        )
    }

    /// A settled payment.
    pub fn payment(account_id: Uuid, amount: Amount, remark: String, balance_before: i64) -> Self {
        Self::new(
            account_id,
            TransactionType::Credit,
            amount,
            remark,
            balance_before,
            TransactionStatus::Success,
        )
    }

    /// An outgoing transfer awaiting settlement, with projected balances.
    pub fn pending_transfer(
        account_id: Uuid,
        amount: Amount,
        remark: String,
        balance_before: i64,
    ) -> Self {
        Self::new(
            account_id,
            TransactionType::Credit,
            amount,
            remark,
            balance_before,
            TransactionStatus::Pending,
        )
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn to_response(&self) -> TransactionResponse {
        TransactionResponse {
            transaction_id: self.id,
            amount: self.amount,
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            status: self.status.into(),
            created_at: format_timestamp(self.created_at),
        }
    }

    pub fn to_details_response(&self) -> TransactionDetailsResponse {
        TransactionDetailsResponse {
            transaction_id: self.id,
            user_id: self.account_id,
            transaction_type: self.transaction_type.into(),
            amount: self.amount,
            remarks: self.remark.clone(),
            balance_before: self.balance_before,
            balance_after: self.balance_after,
            status: self.status.into(),
            created_at: format_timestamp(self.created_at),
        }
    }
}
