use super::{LedgerStore, SettlementCommit, StoreError};
use crate::entities::{Account, SettlementEntry, TransactionRecord, TransactionStatus};
use crate::framework::{DatabaseAccessor, DatabaseProcessor, TransactionProcessor};
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use uuid::Uuid;

const ACCOUNT_COLUMNS: &str = "id, balance, version, created_at, updated_at";

const RECORD_COLUMNS: &str = "id, account_id, transaction_type, amount, remark, \
    balance_before, balance_after, status, created_at";

#[derive(Debug, Clone)]
pub struct GetAccountById {
    pub id: Uuid,
}

impl Processor<GetAccountById> for DatabaseProcessor {
    type Output = Option<Account>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetAccountById")]
    async fn process(&self, query: GetAccountById) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct InsertAccount {
    pub account: Account,
}

impl Processor<InsertAccount> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertAccount")]
    async fn process(&self, insert: InsertAccount) -> Result<(), sqlx::Error> {
        let account = insert.account;
        sqlx::query(
            r#"
            INSERT INTO accounts (id, balance, version, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(account.id)
        .bind(account.balance)
        .bind(account.version)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Compare-and-set update of an account balance.
///
/// Returns `None` when no row matched, i.e. the version moved on (or the
/// account vanished).
pub struct UpdateAccountBalance {
    pub id: Uuid,
    pub balance: i64,
    pub expected_version: i64,
}

impl UpdateAccountBalance {
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateAccountBalance")]
    pub async fn execute<'e>(
        self,
        executor: impl sqlx::PgExecutor<'e>,
    ) -> Result<Option<Account>, sqlx::Error> {
        sqlx::query_as::<_, Account>(&format!(
            r#"
            UPDATE accounts
            SET balance = $2, version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $3
            RETURNING {ACCOUNT_COLUMNS}
            "#
        ))
        .bind(self.id)
        .bind(self.balance)
        .bind(self.expected_version)
        .fetch_optional(executor)
        .await
    }
}

impl Processor<UpdateAccountBalance> for DatabaseProcessor {
    type Output = Option<Account>;
    type Error = sqlx::Error;
    async fn process(&self, cmd: UpdateAccountBalance) -> Result<Option<Account>, sqlx::Error> {
        cmd.execute(&self.pool).await
    }
}

#[derive(Debug, Clone)]
pub struct InsertTransactionRecord {
    pub record: TransactionRecord,
}

impl InsertTransactionRecord {
    #[tracing::instrument(skip_all, err, name = "SQL:InsertTransactionRecord")]
    pub async fn execute<'e>(self, executor: impl sqlx::PgExecutor<'e>) -> Result<(), sqlx::Error> {
        let record = self.record;
        sqlx::query(
            r#"
            INSERT INTO transaction_records
            (id, account_id, transaction_type, amount, remark,
             balance_before, balance_after, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(record.id)
        .bind(record.account_id)
        .bind(record.transaction_type)
        .bind(record.amount)
        .bind(record.remark)
        .bind(record.balance_before)
        .bind(record.balance_after)
        .bind(record.status)
        .bind(record.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

impl Processor<InsertTransactionRecord> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, insert: InsertTransactionRecord) -> Result<(), sqlx::Error> {
        insert.execute(&self.pool).await
    }
}

#[derive(Debug, Clone)]
pub struct GetTransactionRecordById {
    pub id: Uuid,
}

impl Processor<GetTransactionRecordById> for DatabaseProcessor {
    type Output = Option<TransactionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetTransactionRecordById")]
    async fn process(
        &self,
        query: GetTransactionRecordById,
    ) -> Result<Option<TransactionRecord>, sqlx::Error> {
        sqlx::query_as::<_, TransactionRecord>(&format!(
            "SELECT {RECORD_COLUMNS} FROM transaction_records WHERE id = $1"
        ))
        .bind(query.id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
/// Write back the mutable part of a record. Returns the number of rows updated.
pub struct UpdateTransactionStatus {
    pub id: Uuid,
    pub status: TransactionStatus,
}

impl UpdateTransactionStatus {
    #[tracing::instrument(skip_all, err, name = "SQL:UpdateTransactionStatus")]
    pub async fn execute<'e>(self, executor: impl sqlx::PgExecutor<'e>) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("UPDATE transaction_records SET status = $2 WHERE id = $1")
            .bind(self.id)
            .bind(self.status)
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }
}

impl Processor<UpdateTransactionStatus> for DatabaseProcessor {
    type Output = u64;
    type Error = sqlx::Error;
    async fn process(&self, cmd: UpdateTransactionStatus) -> Result<u64, sqlx::Error> {
        cmd.execute(&self.pool).await
    }
}

#[derive(Debug, Clone)]
pub struct ListTransactionRecordsByAccount {
    pub account_id: Uuid,
}

impl Processor<ListTransactionRecordsByAccount> for DatabaseProcessor {
    type Output = Vec<TransactionRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListTransactionRecordsByAccount")]
    async fn process(
        &self,
        query: ListTransactionRecordsByAccount,
    ) -> Result<Vec<TransactionRecord>, sqlx::Error> {
        sqlx::query_as::<_, TransactionRecord>(&format!(
            r#"
            SELECT {RECORD_COLUMNS}
            FROM transaction_records
            WHERE account_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(query.account_id)
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct InsertSettlementEntry {
    pub entry: SettlementEntry,
}

impl InsertSettlementEntry {
    #[tracing::instrument(skip_all, err, name = "SQL:InsertSettlementEntry")]
    pub async fn execute<'e>(self, executor: impl sqlx::PgExecutor<'e>) -> Result<(), sqlx::Error> {
        let entry = self.entry;
        sqlx::query(
            r#"
            INSERT INTO settlement_outbox
            (transaction_id, source_account_id, target_account_id, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.transaction_id)
        .bind(entry.source_account_id)
        .bind(entry.target_account_id)
        .bind(entry.amount)
        .bind(entry.created_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

impl Processor<InsertSettlementEntry> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, insert: InsertSettlementEntry) -> Result<(), sqlx::Error> {
        insert.execute(&self.pool).await
    }
}

#[derive(Debug, Clone)]
pub struct ListSettlementEntries;

impl Processor<ListSettlementEntries> for DatabaseProcessor {
    type Output = Vec<SettlementEntry>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:ListSettlementEntries")]
    async fn process(&self, _: ListSettlementEntries) -> Result<Vec<SettlementEntry>, sqlx::Error> {
        sqlx::query_as::<_, SettlementEntry>(
            r#"
            SELECT transaction_id, source_account_id, target_account_id, amount, created_at
            FROM settlement_outbox
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
    }
}

#[derive(Debug, Clone)]
pub struct DeleteSettlementEntry {
    pub transaction_id: Uuid,
}

impl DeleteSettlementEntry {
    #[tracing::instrument(skip_all, err, name = "SQL:DeleteSettlementEntry")]
    pub async fn execute<'e>(self, executor: impl sqlx::PgExecutor<'e>) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM settlement_outbox WHERE transaction_id = $1")
            .bind(self.transaction_id)
            .execute(executor)
            .await?;
        Ok(())
    }
}

impl Processor<DeleteSettlementEntry> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    async fn process(&self, cmd: DeleteSettlementEntry) -> Result<(), sqlx::Error> {
        cmd.execute(&self.pool).await
    }
}

/// Postgres-backed ledger. Schema lives in `migrations/`.
#[derive(Clone)]
pub struct PgLedger {
    processor: DatabaseProcessor,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor::new(pool),
        }
    }
}

/// Map a unique-constraint violation onto [`StoreError::DuplicateKey`].
fn insert_error(e: sqlx::Error, key: Uuid) -> StoreError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => StoreError::DuplicateKey(key),
        _ => StoreError::Database(e),
    }
}

/// Compare-and-set one account inside an open transaction.
async fn save_account_in(
    tx: &mut TransactionProcessor<'_>,
    account: &Account,
) -> Result<(), StoreError> {
    UpdateAccountBalance {
        id: account.id,
        balance: account.balance,
        expected_version: account.version,
    }
    .execute(tx.acquire())
    .await?
    .ok_or(StoreError::VersionConflict {
        account_id: account.id,
        expected: account.version,
    })?;
    Ok(())
}

#[async_trait]
impl LedgerStore for PgLedger {
    async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
        let id = account.id;
        self.processor
            .process(InsertAccount { account })
            .await
            .map_err(|e| insert_error(e, id))
    }

    async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
        Ok(self.processor.process(GetAccountById { id }).await?)
    }

    async fn save_account(&self, account: Account) -> Result<Account, StoreError> {
        self.processor
            .process(UpdateAccountBalance {
                id: account.id,
                balance: account.balance,
                expected_version: account.version,
            })
            .await?
            .ok_or(StoreError::VersionConflict {
                account_id: account.id,
                expected: account.version,
            })
    }

    async fn create_transaction_record(
        &self,
        record: TransactionRecord,
    ) -> Result<(), StoreError> {
        let id = record.id;
        self.processor
            .process(InsertTransactionRecord { record })
            .await
            .map_err(|e| insert_error(e, id))
    }

    async fn get_transaction_record(
        &self,
        id: Uuid,
    ) -> Result<Option<TransactionRecord>, StoreError> {
        Ok(self.processor.process(GetTransactionRecordById { id }).await?)
    }

    async fn update_transaction_record(
        &self,
        record: TransactionRecord,
    ) -> Result<(), StoreError> {
        let updated = self
            .processor
            .process(UpdateTransactionStatus {
                id: record.id,
                status: record.status,
            })
            .await?;
        if updated == 0 {
            return Err(StoreError::Missing(record.id));
        }
        Ok(())
    }

    async fn list_transaction_records_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, StoreError> {
        Ok(self
            .processor
            .process(ListTransactionRecordsByAccount { account_id })
            .await?)
    }

    async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError> {
        let id = entry.transaction_id;
        self.processor
            .process(InsertSettlementEntry { entry })
            .await
            .map_err(|e| insert_error(e, id))
    }

    async fn pending_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError> {
        Ok(self.processor.process(ListSettlementEntries).await?)
    }

    async fn complete_settlement(&self, transaction_id: Uuid) -> Result<(), StoreError> {
        Ok(self
            .processor
            .process(DeleteSettlementEntry { transaction_id })
            .await?)
    }

    async fn accept_transfer(
        &self,
        record: TransactionRecord,
        entry: SettlementEntry,
    ) -> Result<(), StoreError> {
        let id = record.id;
        let mut tx = self.processor.begin().await?;
        InsertTransactionRecord { record }
            .execute(tx.acquire())
            .await
            .map_err(|e| insert_error(e, id))?;
        InsertSettlementEntry { entry }
            .execute(tx.acquire())
            .await
            .map_err(|e| insert_error(e, id))?;
        tx.commit().await?;
        Ok(())
    }

    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<(), StoreError> {
        let mut tx = self.processor.begin().await?;
        save_account_in(&mut tx, &commit.sender).await?;
        save_account_in(&mut tx, &commit.target).await?;

        let updated = UpdateTransactionStatus {
            id: commit.transaction_id,
            status: TransactionStatus::Success,
        }
        .execute(tx.acquire())
        .await?;
        if updated == 0 {
            return Err(StoreError::Missing(commit.transaction_id));
        }

        DeleteSettlementEntry {
            transaction_id: commit.transaction_id,
        }
        .execute(tx.acquire())
        .await?;

        tx.commit().await?;
        Ok(())
    }
}
