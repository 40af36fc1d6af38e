//! SettlementWorker processor.
//!
//! The SettlementWorker is responsible for:
//! - Receiving `TransferEvent` from its event bus subscription
//! - Debiting the sender and crediting the target
//! - Flipping the transaction record from `Pending` to `Success`
//! - Removing the transfer's settlement outbox entry
//!
//! All three writes go through one [`LedgerStore::commit_settlement`], so a
//! failed attempt moves no money and leaves the record `Pending` with its
//! outbox entry in place for the next startup's recovery.
//!
//! Failures are logged and the attempt is abandoned; nothing is reported
//! back to the original caller. There is no deduplication: the same event
//! delivered twice is applied twice.
//!
//! [`LedgerStore::commit_settlement`]: crate::store::LedgerStore::commit_settlement

use crate::config::SettlementConfig;
use crate::events::{Event, Subscription, TransferEvent};
use crate::store::{SettlementCommit, SharedLedger, StoreError};
use kanau::processor::Processor;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Reasons a settlement attempt was abandoned.
///
/// Never surfaced to a caller; the visible symptom is a record stuck in
/// `Pending`.
#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("sender account {0} not found")]
    SenderNotFound(Uuid),

    #[error("target account {0} not found")]
    TargetNotFound(Uuid),

    /// The sender spent the money between acceptance and settlement.
    #[error("sender {account_id} can no longer cover {requested} (balance {balance})")]
    InsufficientBalance {
        account_id: Uuid,
        balance: i64,
        requested: i64,
    },

    #[error("balance of target account {0} would overflow")]
    BalanceOverflow(Uuid),

    #[error("account {0} kept changing, gave up")]
    Contention(Uuid),

    #[error("transaction record {0} not found")]
    TransactionNotFound(Uuid),

    /// Database error
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Performs the two-sided balance move for one transfer.
#[derive(Clone)]
pub struct TransferSettler {
    ledger: SharedLedger,
    max_conflict_retries: u32,
}

impl TransferSettler {
    pub fn new(ledger: SharedLedger, config: &SettlementConfig) -> Self {
        Self {
            ledger,
            max_conflict_retries: config.max_conflict_retries,
        }
    }

    /// Read both accounts and compute their settled state.
    async fn prepare(
        &self,
        transaction_id: Uuid,
        sender_id: Uuid,
        target_id: Uuid,
        amount: i64,
    ) -> Result<SettlementCommit, SettlementError> {
        let mut sender = self
            .ledger
            .get_account(sender_id)
            .await?
            .ok_or(SettlementError::SenderNotFound(sender_id))?;
        let mut target = self
            .ledger
            .get_account(target_id)
            .await?
            .ok_or(SettlementError::TargetNotFound(target_id))?;

        if amount > sender.balance {
            return Err(SettlementError::InsufficientBalance {
                account_id: sender_id,
                balance: sender.balance,
                requested: amount,
            });
        }
        sender.balance -= amount;
        target.balance = target
            .balance
            .checked_add(amount)
            .ok_or(SettlementError::BalanceOverflow(target_id))?;

        Ok(SettlementCommit {
            transaction_id,
            sender,
            target,
        })
    }
}

impl Processor<TransferEvent> for TransferSettler {
    type Output = ();
    type Error = SettlementError;

    #[tracing::instrument(skip_all, err, fields(transaction_id = %event.record.id))]
    async fn process(&self, event: TransferEvent) -> Result<(), SettlementError> {
        let TransferEvent { record, target_id } = event;
        let sender_id = record.account_id;

        for attempt in 0..=self.max_conflict_retries {
            let commit = self
                .prepare(record.id, sender_id, target_id, record.amount)
                .await?;
            let sender_balance = commit.sender.balance;
            let target_balance = commit.target.balance;

            match self.ledger.commit_settlement(commit).await {
                Ok(()) => {
                    if sender_balance != record.balance_after {
                        warn!(
                            %sender_id,
                            projected = record.balance_after,
                            actual = sender_balance,
                            "Sender balance after settlement differs from the projection on the record"
                        );
                    }
                    info!(
                        %sender_id,
                        %target_id,
                        amount = record.amount,
                        sender_balance,
                        target_balance,
                        "Transfer settled"
                    );
                    return Ok(());
                }
                Err(e) if e.is_conflict() => {
                    debug!(%sender_id, %target_id, attempt, "Settlement lost a version race, retrying");
                }
                Err(StoreError::Missing(id)) if id == record.id => {
                    return Err(SettlementError::TransactionNotFound(id));
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(SettlementError::Contention(sender_id))
    }
}

/// Long-running consumer of transfer events.
pub struct SettlementWorker {
    settler: TransferSettler,
    subscription: Subscription,
    shutdown_rx: watch::Receiver<bool>,
}

impl SettlementWorker {
    /// Create a new SettlementWorker.
    ///
    /// # Arguments
    ///
    /// * `settler` - Performs the balance moves
    /// * `subscription` - Subscription to `EventKind::Transfer`
    /// * `shutdown_rx` - Receiver for shutdown signal
    pub fn new(
        settler: TransferSettler,
        subscription: Subscription,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settler,
            subscription,
            shutdown_rx,
        }
    }

    /// Run the SettlementWorker until shutdown or until the bus is closed.
    pub async fn run(mut self) {
        info!("SettlementWorker started");

        loop {
            tokio::select! {
                biased;

                // Check for shutdown
                changed = self.shutdown_rx.changed() => {
                    if changed.is_err() || *self.shutdown_rx.borrow() {
                        info!("SettlementWorker received shutdown signal");
                        break;
                    }
                }

                // Receive transfer events
                Some(event) = self.subscription.recv() => {
                    let Event::Transfer(transfer) = event;
                    debug!(
                        transaction_id = %transfer.record.id,
                        target_id = %transfer.target_id,
                        "Received TransferEvent"
                    );

                    let transaction_id = transfer.record.id;
                    if let Err(e) = self.settler.process(transfer).await {
                        error!(
                            %transaction_id,
                            error = %e,
                            "Settlement abandoned, transaction left pending"
                        );
                    }
                }

                else => {
                    info!("Transfer event channel closed");
                    break;
                }
            }
        }

        info!("SettlementWorker shutdown complete");
    }
}
