//! Startup replay of the settlement outbox.
//!
//! Transfers accepted by a previous run whose settlement never completed are
//! still in the outbox. Their events are published again so the running
//! worker can settle them. Call this only after the worker has subscribed,
//! otherwise the events are dropped.
//!
//! A `Pending` record means no money moved for it: settlement commits the
//! balances and the status flip together, so re-publishing cannot apply a
//! transfer a second time.

use crate::entities::TransactionStatus;
use crate::events::{EventBus, TransferEvent};
use crate::store::{SharedLedger, StoreError};
use tracing::{info, warn};

/// What a recovery pass did with each outbox entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Entries whose record is still pending; their events were re-published.
    pub republished: usize,
    /// Entries whose record already reached `Success`; removed from the outbox.
    pub already_settled: usize,
    /// Entries with no transaction record at all; removed from the outbox.
    pub orphaned: usize,
}

#[tracing::instrument(skip_all, err)]
pub async fn recover_pending_settlements(
    ledger: &SharedLedger,
    bus: &EventBus,
) -> Result<RecoveryReport, StoreError> {
    let entries = ledger.pending_settlements().await?;
    let mut report = RecoveryReport::default();

    for entry in entries {
        let Some(record) = ledger.get_transaction_record(entry.transaction_id).await? else {
            warn!(
                transaction_id = %entry.transaction_id,
                "Outbox entry has no transaction record, discarding"
            );
            ledger.complete_settlement(entry.transaction_id).await?;
            report.orphaned += 1;
            continue;
        };

        if record.status == TransactionStatus::Success {
            ledger.complete_settlement(entry.transaction_id).await?;
            report.already_settled += 1;
            continue;
        }

        let delivered = bus
            .publish(TransferEvent {
                record,
                target_id: entry.target_account_id,
            })
            .await;
        if delivered == 0 {
            warn!(
                transaction_id = %entry.transaction_id,
                "No settlement worker subscribed, entry stays in the outbox"
            );
        }
        report.republished += 1;
    }

    info!(
        republished = report.republished,
        already_settled = report.already_settled,
        orphaned = report.orphaned,
        "Settlement outbox recovery finished"
    );
    Ok(report)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::SettlementConfig;
    use crate::entities::{Account, Amount, SettlementEntry, TransactionRecord};
    use crate::events::{Event, EventKind, PublishPolicy};
    use crate::processors::{SettlementError, TransferSettler};
    use crate::store::{LedgerStore, MemoryLedger, SettlementCommit};
    use async_trait::async_trait;
    use kanau::processor::Processor;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use uuid::Uuid;

    /// Ledger whose first `failures` settlement commits fail.
    struct FlakyCommit {
        inner: MemoryLedger,
        failures: AtomicU32,
    }

    #[async_trait]
    impl LedgerStore for FlakyCommit {
        async fn insert_account(&self, account: Account) -> Result<(), StoreError> {
            self.inner.insert_account(account).await
        }
        async fn get_account(&self, id: Uuid) -> Result<Option<Account>, StoreError> {
            self.inner.get_account(id).await
        }
        async fn save_account(&self, account: Account) -> Result<Account, StoreError> {
            self.inner.save_account(account).await
        }
        async fn create_transaction_record(
            &self,
            record: TransactionRecord,
        ) -> Result<(), StoreError> {
            self.inner.create_transaction_record(record).await
        }
        async fn get_transaction_record(
            &self,
            id: Uuid,
        ) -> Result<Option<TransactionRecord>, StoreError> {
            self.inner.get_transaction_record(id).await
        }
        async fn update_transaction_record(
            &self,
            record: TransactionRecord,
        ) -> Result<(), StoreError> {
            self.inner.update_transaction_record(record).await
        }
        async fn list_transaction_records_by_account(
            &self,
            account_id: Uuid,
        ) -> Result<Vec<TransactionRecord>, StoreError> {
            self.inner.list_transaction_records_by_account(account_id).await
        }
        async fn enqueue_settlement(&self, entry: SettlementEntry) -> Result<(), StoreError> {
            self.inner.enqueue_settlement(entry).await
        }
        async fn pending_settlements(&self) -> Result<Vec<SettlementEntry>, StoreError> {
            self.inner.pending_settlements().await
        }
        async fn complete_settlement(&self, transaction_id: Uuid) -> Result<(), StoreError> {
            self.inner.complete_settlement(transaction_id).await
        }
        async fn accept_transfer(
            &self,
            record: TransactionRecord,
            entry: SettlementEntry,
        ) -> Result<(), StoreError> {
            self.inner.accept_transfer(record, entry).await
        }
        async fn commit_settlement(&self, commit: SettlementCommit) -> Result<(), StoreError> {
            let remaining = self.failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.failures.store(remaining - 1, Ordering::SeqCst);
                return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
            }
            self.inner.commit_settlement(commit).await
        }
    }

    async fn seed_pending(ledger: &MemoryLedger, source: Uuid, target: Uuid) -> TransactionRecord {
        let record =
            TransactionRecord::pending_transfer(source, Amount::new(40).unwrap(), String::new(), 100);
        ledger.create_transaction_record(record.clone()).await.unwrap();
        ledger
            .enqueue_settlement(SettlementEntry {
                transaction_id: record.id,
                source_account_id: source,
                target_account_id: target,
                amount: record.amount,
                created_at: record.created_at,
            })
            .await
            .unwrap();
        record
    }

    #[tokio::test]
    async fn test_republishes_pending_and_clears_settled() {
        let a = Uuid::now_v7();
        let t = Uuid::now_v7();
        let memory =
            MemoryLedger::with_accounts([Account::open(a, 100), Account::open(t, 0)]).await;
        let pending = seed_pending(&memory, a, t).await;
        let mut settled = seed_pending(&memory, a, t).await;
        settled.status = TransactionStatus::Success;
        memory.update_transaction_record(settled.clone()).await.unwrap();

        let bus = EventBus::new(4, PublishPolicy::Wait);
        let mut sub = bus.subscribe(EventKind::Transfer).await;
        let ledger: SharedLedger = Arc::new(memory.clone());

        let report = recover_pending_settlements(&ledger, &bus).await.unwrap();
        assert_eq!(
            report,
            RecoveryReport {
                republished: 1,
                already_settled: 1,
                orphaned: 0,
            }
        );

        let Some(Event::Transfer(event)) = sub.recv().await else {
            unreachable!("transfer event expected");
        };
        assert_eq!(event.record, pending);
        assert_eq!(event.target_id, t);
        assert!(sub.try_recv().is_none());

        let remaining = memory.pending_settlements().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].transaction_id, pending.id);
    }

    #[tokio::test]
    async fn test_orphaned_entry_is_discarded() {
        let memory = MemoryLedger::new();
        memory
            .enqueue_settlement(SettlementEntry {
                transaction_id: Uuid::now_v7(),
                source_account_id: Uuid::now_v7(),
                target_account_id: Uuid::now_v7(),
                amount: 5,
                created_at: time::OffsetDateTime::now_utc(),
            })
            .await
            .unwrap();
        let ledger: SharedLedger = Arc::new(memory.clone());

        let report = recover_pending_settlements(&ledger, &EventBus::default())
            .await
            .unwrap();
        assert_eq!(report.orphaned, 1);
        assert!(memory.pending_settlements().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_entries_stay_queued_without_worker() {
        let a = Uuid::now_v7();
        let t = Uuid::now_v7();
        let memory =
            MemoryLedger::with_accounts([Account::open(a, 100), Account::open(t, 0)]).await;
        seed_pending(&memory, a, t).await;
        let ledger: SharedLedger = Arc::new(memory.clone());

        let report = recover_pending_settlements(&ledger, &EventBus::default())
            .await
            .unwrap();
        assert_eq!(report.republished, 1);
        assert_eq!(memory.pending_settlements().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_settlement_is_applied_once_after_recovery() {
        let a = Uuid::now_v7();
        let t = Uuid::now_v7();
        let memory =
            MemoryLedger::with_accounts([Account::open(a, 1000), Account::open(t, 500)]).await;
        let record =
            TransactionRecord::pending_transfer(a, Amount::new(300).unwrap(), String::new(), 1000);
        memory
            .accept_transfer(
                record.clone(),
                SettlementEntry {
                    transaction_id: record.id,
                    source_account_id: a,
                    target_account_id: t,
                    amount: 300,
                    created_at: record.created_at,
                },
            )
            .await
            .unwrap();

        let ledger: SharedLedger = Arc::new(FlakyCommit {
            inner: memory.clone(),
            failures: AtomicU32::new(1),
        });
        let settler = TransferSettler::new(ledger.clone(), &SettlementConfig::default());

        // First attempt fails while finalizing; nothing may have moved.
        let first = settler
            .process(TransferEvent {
                record: record.clone(),
                target_id: t,
            })
            .await;
        assert!(matches!(first, Err(SettlementError::Store(_))));
        assert_eq!(memory.get_account(a).await.unwrap().unwrap().balance, 1000);
        assert_eq!(memory.get_account(t).await.unwrap().unwrap().balance, 500);

        // Next startup: recovery republishes, the worker settles it.
        let bus = EventBus::new(4, PublishPolicy::Wait);
        let mut sub = bus.subscribe(EventKind::Transfer).await;
        let report = recover_pending_settlements(&ledger, &bus).await.unwrap();
        assert_eq!(report.republished, 1);
        let Some(Event::Transfer(event)) = sub.recv().await else {
            unreachable!("transfer event expected");
        };
        settler.process(event).await.unwrap();

        assert_eq!(memory.get_account(a).await.unwrap().unwrap().balance, 700);
        assert_eq!(memory.get_account(t).await.unwrap().unwrap().balance, 800);
        let stored = memory.get_transaction_record(record.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Success);
        assert!(memory.pending_settlements().await.unwrap().is_empty());

        // A further restart finds nothing to do.
        let report = recover_pending_settlements(&ledger, &bus).await.unwrap();
        assert_eq!(report, RecoveryReport::default());
        assert_eq!(memory.total_balance().await, 1500);
    }
}
