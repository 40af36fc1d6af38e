//! Ledger storage port and adapters.
//!
//! [`LedgerStore`] is everything the service and the settlement worker need
//! from persistence: account point lookups and version-checked updates,
//! transaction record CRUD, and the settlement outbox.
//!
//! Two operations are all-or-nothing: [`LedgerStore::accept_transfer`] writes
//! a pending record together with its outbox entry, and
//! [`LedgerStore::commit_settlement`] moves the money, finalizes the record
//! and clears the outbox entry. A transfer whose record is still `Pending`
//! therefore has moved no money.

mod memory;
mod postgres;

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

use crate::entities::{Account, SettlementEntry, TransactionRecord};
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by a [`LedgerStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The account was written by someone else since it was read.
    #[error("account {account_id} was modified concurrently (expected version {expected})")]
    VersionConflict { account_id: Uuid, expected: i64 },

    /// An insert collided with an existing primary key.
    #[error("duplicate key {0}")]
    DuplicateKey(Uuid),

    /// An update targeted a row that does not exist.
    #[error("row {0} not found")]
    Missing(Uuid),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::VersionConflict { .. })
    }
}

/// Everything written when a transfer settles.
///
/// Both accounts carry their new balance and the version they were read at.
#[derive(Debug, Clone)]
pub struct SettlementCommit {
    pub transaction_id: Uuid,
    pub sender: Account,
    pub target: Account,
}

/// Durable storage for accounts, transaction records and pending settlements.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError>;

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError>;

    /// Persist a changed account.
    ///
    /// Succeeds only if the stored version still equals `account.version`;
    /// returns the account as stored, with its new version.
    async fn save_account(&self, account: Account) -> Result<Account, StoreError>;

    async fn create_transaction_record(&self, record: TransactionRecord)
    -> Result<(), StoreError>;

    async fn get_transaction_record(
        &self,
        id: Uuid,
    ) -> Result<Option<TransactionRecord>, StoreError>;

    async fn update_transaction_record(
        &self,
        record: TransactionRecord,
    ) -> Result<(), StoreError>;

    /// All records owned by `account_id`, oldest first.
    async fn list_transaction_records_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError>;

    /// Every outbox entry not yet completed, oldest first.
    async fn pending_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError>;

    async fn complete_settlement(&self, transaction_id: Uuid) -> Result<(), StoreError>;

    /// Persist a pending transfer record and its outbox entry in one unit.
    async fn accept_transfer(
        &self,
        record: TransactionRecord,
        entry: SettlementEntry,
    ) -> Result<(), StoreError>;

    /// Save both balances, mark the record `Success` and remove the outbox
    /// entry in one unit.
    ///
    /// Fails with [`StoreError::VersionConflict`] if either account moved on
    /// and with [`StoreError::Missing`] if the record is gone. Nothing is
    /// written in either case.
    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<(), StoreError>;
}

/// Shared handle to a ledger store.
pub type SharedLedger = Arc<dyn LedgerStore>;
