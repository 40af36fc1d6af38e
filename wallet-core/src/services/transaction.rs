//! TransactionService.
//!
//! The TransactionService is responsible for:
//! - Top-ups and payments, applied to the account synchronously
//! - Accepting transfers: persisting a pending record and an outbox entry,
//!   then publishing a `TransferEvent` for the settlement worker
//! - Reading an account's transaction history
//!
//! A transfer does not touch any balance here. The returned record is
//! `Pending` and its `balance_after` is a projection; the settlement worker
//! performs the actual two-sided move later.

use super::{BalanceChange, BalanceUpdateError, update_balance};
use crate::config::SettlementConfig;
use crate::entities::{Account, Amount, SettlementEntry, TransactionRecord};
use crate::events::{EventBus, TransferEvent};
use crate::store::{SharedLedger, StoreError};
use thiserror::Error;
use tracing::{error, info};
use uuid::Uuid;

/// Errors returned to the caller of a [`TransactionService`] operation.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("account {0} not found")]
    AccountNotFound(Uuid),

    #[error("target account {0} not found")]
    TargetNotFound(Uuid),

    #[error("insufficient balance on account {account_id}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account_id: Uuid,
        balance: i64,
        requested: i64,
    },

    #[error("cannot transfer to the source account itself")]
    SelfTransfer,

    #[error("balance of account {0} would overflow")]
    BalanceOverflow(Uuid),

    /// The account kept changing underneath us; the caller may retry.
    #[error("account {0} is busy, try again")]
    Contention(Uuid),

    #[error("transaction {0} not found")]
    TransactionNotFound(Uuid),

    #[error("persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl TransactionError {
    fn from_balance_update(account_id: Uuid, err: BalanceUpdateError<TransactionError>) -> Self {
        match err {
            BalanceUpdateError::NotFound => TransactionError::AccountNotFound(account_id),
            BalanceUpdateError::Rejected(e) => e,
            BalanceUpdateError::Contention => TransactionError::Contention(account_id),
            BalanceUpdateError::Store(e) => TransactionError::Persistence(e),
        }
    }
}

/// Orchestrates balance operations against the ledger.
#[derive(Clone)]
pub struct TransactionService {
    ledger: SharedLedger,
    bus: EventBus,
    max_conflict_retries: u32,
}

impl TransactionService {
    /// Create a new TransactionService.
    ///
    /// # Arguments
    ///
    /// * `ledger` - Storage for accounts, records and the settlement outbox
    /// * `bus` - Event bus the settlement worker is subscribed to
    /// * `config` - Retry budget for balance writes
    pub fn new(ledger: SharedLedger, bus: EventBus, config: &SettlementConfig) -> Self {
        Self {
            ledger,
            bus,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Add `amount` to the account and record a settled `Debit`.
    ///
    /// If the record cannot be written after the balance was saved, the
    /// balance change stays in place and the error is returned.
    pub async fn process_top_up(
        &self,
        account_id: Uuid,
        amount: Amount,
    ) -> Result<TransactionRecord, TransactionError> {
        let change = self
            .apply(account_id, |account| {
                account
                    .balance
                    .checked_add(amount.get())
                    .ok_or(TransactionError::BalanceOverflow(account_id))
            })
            .await?;

        let record = TransactionRecord::top_up(account_id, amount, change.before);
        self.persist_settled_record(&record).await?;

        info!(
            %account_id,
            transaction_id = %record.id,
            amount = %amount,
            balance_after = change.account.balance,
            "Top-up applied"
        );
        Ok(record)
    }

    /// Subtract `amount` from the account and record a settled `Credit`.
    pub async fn process_payment(
        &self,
        account_id: Uuid,
        amount: Amount,
        remark: String,
    ) -> Result<TransactionRecord, TransactionError> {
        let change = self
            .apply(account_id, |account| {
                if amount.get() > account.balance {
                    return Err(TransactionError::InsufficientBalance {
                        account_id,
                        balance: account.balance,
                        requested: amount.get(),
                    });
                }
                Ok(account.balance - amount.get())
            })
            .await?;

        let record = TransactionRecord::payment(account_id, amount, remark, change.before);
        self.persist_settled_record(&record).await?;

        info!(
            %account_id,
            transaction_id = %record.id,
            amount = %amount,
            balance_after = change.account.balance,
            "Payment applied"
        );
        Ok(record)
    }

    /// Accept a transfer for asynchronous settlement.
    ///
    /// Checks the source balance and that the target exists, persists a
    /// pending `Credit` record with projected balances together with its
    /// outbox entry, and publishes the event. No balance is changed here.
    /// If the write fails nothing is published.
    pub async fn process_transfer(
        &self,
        source_id: Uuid,
        target_id: Uuid,
        amount: Amount,
        remark: String,
    ) -> Result<TransactionRecord, TransactionError> {
        if source_id == target_id {
            return Err(TransactionError::SelfTransfer);
        }

        let source = self
            .ledger
            .get_account(source_id)
            .await?
            .ok_or(TransactionError::AccountNotFound(source_id))?;

        if amount.get() > source.balance {
            return Err(TransactionError::InsufficientBalance {
                account_id: source_id,
                balance: source.balance,
                requested: amount.get(),
            });
        }

        if self.ledger.get_account(target_id).await?.is_none() {
            return Err(TransactionError::TargetNotFound(target_id));
        }

        let record = TransactionRecord::pending_transfer(source_id, amount, remark, source.balance);
        let entry = SettlementEntry {
            transaction_id: record.id,
            source_account_id: source_id,
            target_account_id: target_id,
            amount: amount.get(),
            created_at: record.created_at,
        };
        self.ledger.accept_transfer(record.clone(), entry).await?;

        let delivered = self
            .bus
            .publish(TransferEvent {
                record: record.clone(),
                target_id,
            })
            .await;

        info!(
            %source_id,
            %target_id,
            transaction_id = %record.id,
            amount = %amount,
            delivered,
            "Transfer accepted, settlement pending"
        );
        Ok(record)
    }

    /// Every record owned by the account, oldest first.
    pub async fn get_all_transactions(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<TransactionRecord>, TransactionError> {
        Ok(self
            .ledger
            .list_transaction_records_by_account(account_id)
            .await?)
    }

    /// A single record, visible only to the account that owns it.
    pub async fn get_transaction(
        &self,
        account_id: Uuid,
        transaction_id: Uuid,
    ) -> Result<TransactionRecord, TransactionError> {
        self.ledger
            .get_transaction_record(transaction_id)
            .await?
            .filter(|record| record.account_id == account_id)
            .ok_or(TransactionError::TransactionNotFound(transaction_id))
    }

    async fn apply(
        &self,
        account_id: Uuid,
        rule: impl FnMut(&Account) -> Result<i64, TransactionError>,
    ) -> Result<BalanceChange, TransactionError> {
        update_balance(
            self.ledger.as_ref(),
            account_id,
            self.max_conflict_retries,
            rule,
        )
        .await
        .map_err(|e| TransactionError::from_balance_update(account_id, e))
    }

    async fn persist_settled_record(
        &self,
        record: &TransactionRecord,
    ) -> Result<(), TransactionError> {
        if let Err(e) = self.ledger.create_transaction_record(record.clone()).await {
            error!(
                account_id = %record.account_id,
                transaction_id = %record.id,
                error = %e,
                "Balance updated but transaction record was not persisted"
            );
            return Err(e.into());
        }
        Ok(())
    }
}
