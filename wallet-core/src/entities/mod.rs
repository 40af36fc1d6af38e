pub mod account;
pub mod settlement_entry;
pub mod transaction_record;

pub use account::Account;
pub use settlement_entry::SettlementEntry;
pub use transaction_record::TransactionRecord;

use wallet_sdk::objects::{
    TransactionStatus as SdkTransactionStatus, TransactionType as SdkTransactionType,
};

/// Transaction type for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `wallet_sdk::objects::TransactionType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_type")]
pub enum TransactionType {
    /// Increases the owner's balance.
    Debit,
    /// Decreases the owner's balance.
    Credit,
}

impl From<TransactionType> for SdkTransactionType {
    fn from(value: TransactionType) -> Self {
        match value {
            TransactionType::Debit => SdkTransactionType::Debit,
            TransactionType::Credit => SdkTransactionType::Credit,
        }
    }
}

impl From<SdkTransactionType> for TransactionType {
    fn from(value: SdkTransactionType) -> Self {
        match value {
            SdkTransactionType::Debit => TransactionType::Debit,
            SdkTransactionType::Credit => TransactionType::Credit,
        }
    }
}

/// Transaction status for database operations.
///
/// This is the sqlx::Type version. For API/DTO use, see `wallet_sdk::objects::TransactionStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "transaction_status")]
pub enum TransactionStatus {
    Pending,
    Success,
}

impl From<TransactionStatus> for SdkTransactionStatus {
    fn from(value: TransactionStatus) -> Self {
        match value {
            TransactionStatus::Pending => SdkTransactionStatus::Pending,
            TransactionStatus::Success => SdkTransactionStatus::Success,
        }
    }
}

impl From<SdkTransactionStatus> for TransactionStatus {
    fn from(value: SdkTransactionStatus) -> Self {
        match value {
            SdkTransactionStatus::Pending => TransactionStatus::Pending,
            SdkTransactionStatus::Success => TransactionStatus::Success,
        }
    }
}

/// The amount passed to a balance operation was zero or negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid amount: {0}")]
pub struct InvalidAmount(pub i64);

/// A strictly positive amount in the smallest currency unit.
///
/// Constructing one is the only place amounts are validated; every
/// operation downstream takes an `Amount` and trusts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub fn new(value: i64) -> Result<Self, InvalidAmount> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(InvalidAmount(value))
        }
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for Amount {
    type Error = InvalidAmount;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for i64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
