use super::{LedgerStore, SettlementCommit, StoreError};
use crate::entities::{Account, SettlementEntry, TransactionRecord, TransactionStatus};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory ledger.
///
/// Applies the same version check on account writes as the Postgres
/// adapter, so concurrency behavior observed in tests carries over.
/// Records keep insertion order. Multi-row writes happen under a single
/// write lock, so readers never observe half of one.
#[derive(Default, Clone)]
pub struct MemoryLedger {
    inner: Arc<RwLock<Tables>>,
}

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    records: Vec<TransactionRecord>,
    record_index: HashMap<Uuid, usize>,
    outbox: Vec<SettlementEntry>,
}

impl Tables {
    fn check_version(&self, account: &Account) -> Result<(), StoreError> {
        let stored = self
            .accounts
            .get(&account.id)
            .ok_or(StoreError::Missing(account.id))?;
        if stored.version != account.version {
            return Err(StoreError::VersionConflict {
                account_id: account.id,
                expected: account.version,
            });
        }
        Ok(())
    }

    /// Write a version-checked account back, bumping its version.
    fn store_account(&mut self, mut account: Account) -> Account {
        account.version += 1;
        account.updated_at = time::OffsetDateTime::now_utc();
        self.accounts.insert(account.id, account.clone());
        account
    }

    fn check_new_record(&self, id: Uuid) -> Result<(), StoreError> {
        if self.record_index.contains_key(&id) {
            return Err(StoreError::DuplicateKey(id));
        }
        Ok(())
    }

    fn push_record(&mut self, record: TransactionRecord) {
        let position = self.records.len();
        self.record_index.insert(record.id, position);
        self.records.push(record);
    }

    fn check_new_entry(&self, transaction_id: Uuid) -> Result<(), StoreError> {
        if self.outbox.iter().any(|e| e.transaction_id == transaction_id) {
            return Err(StoreError::DuplicateKey(transaction_id));
        }
        Ok(())
    }
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger pre-populated with the given accounts.
    pub async fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let ledger = Self::new();
        {
            let mut tables = ledger.inner.write().await;
            for account in accounts {
                tables.accounts.insert(account.id, account);
            }
        }
        ledger
    }

    /// Sum of all account balances.
    pub async fn total_balance(&self) -> i64 {
        let tables = self.inner.read().await;
        tables.accounts.values().map(|a| a.balance).sum()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        if tables.accounts.contains_key(&account.id) {
            return Err(StoreError::DuplicateKey(account.id));
        }
        tables.accounts.insert(account.id, account);
        Ok(())
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn save_account(&self, account: Account) -> Result<Account, StoreError> {
        let mut tables = self.inner.write().await;
        tables.check_version(&account)?;
        Ok(tables.store_account(account))
    }

    async fn create_transaction_record(
        &self,
        record: TransactionRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.check_new_record(record.id)?;
        tables.push_record(record);
        Ok(())
    }

    async fn get_transaction_record(
        &self,
        id: Uuid,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .record_index
            .get(&id)
            .map(|&position| tables.records[position].clone()))
    }

    async fn update_transaction_record(
        &self,
        record: TransactionRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        let position = *tables
            .record_index
            .get(&record.id)
            .ok_or(StoreError::Missing(record.id))?;
        tables.records[position] = record;
        Ok(())
    }

    async fn list_transaction_records_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables
            .records
            .iter()
            .filter(|r| r.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.check_new_entry(entry.transaction_id)?;
        tables.outbox.push(entry);
        Ok(())
    }

    async fn pending_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError> {
        let tables = self.inner.read().await;
        Ok(tables.outbox.clone())
    }

    async fn complete_settlement(&self, transaction_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.outbox.retain(|e| e.transaction_id != transaction_id);
        Ok(())
    }

    async fn accept_transfer(
        &self,
        record: TransactionRecord,
        entry: SettlementEntry,
    ) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.check_new_record(record.id)?;
        tables.check_new_entry(entry.transaction_id)?;
        tables.push_record(record);
        tables.outbox.push(entry);
        Ok(())
    }

    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<(), StoreError> {
        let mut tables = self.inner.write().await;
        tables.check_version(&commit.sender)?;
        tables.check_version(&commit.target)?;
        if commit.sender.id == commit.target.id {
            // The second write would see the version bumped by the first.
            return Err(StoreError::VersionConflict {
                account_id: commit.target.id,
                expected: commit.target.version,
            });
        }
        let position = *tables
            .record_index
            .get(&commit.transaction_id)
            .ok_or(StoreError::Missing(commit.transaction_id))?;

        tables.store_account(commit.sender);
        tables.store_account(commit.target);
        tables.records[position].status = TransactionStatus::Success;
        tables
            .outbox
            .retain(|e| e.transaction_id != commit.transaction_id);
        Ok(())
    }
}
