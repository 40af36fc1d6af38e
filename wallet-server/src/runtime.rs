//! Startup and teardown of the settlement pipeline around a ledger.

use crate::config::file::SeedAccount;
use crate::state::AppState;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use wallet_core::config::SettlementConfig;
use wallet_core::entities::Account;
use wallet_core::events::{EventBus, EventKind};
use wallet_core::processors::{SettlementWorker, TransferSettler, recover_pending_settlements};
use wallet_core::services::TransactionService;
use wallet_core::store::{SharedLedger, StoreError};

/// A running settlement worker plus the state handed to the router.
pub struct WalletRuntime {
    pub state: AppState,
    bus: EventBus,
    shutdown_tx: watch::Sender<bool>,
    worker: JoinHandle<()>,
}

impl WalletRuntime {
    /// Subscribe and spawn the settlement worker, then replay the outbox if
    /// configured to.
    pub async fn start(
        ledger: SharedLedger,
        config: &SettlementConfig,
    ) -> Result<Self, StoreError> {
        let bus = EventBus::new(config.queue_capacity, config.publish_policy);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let subscription = bus.subscribe(EventKind::Transfer).await;
        let settler = TransferSettler::new(ledger.clone(), config);
        let worker = tokio::spawn(SettlementWorker::new(settler, subscription, shutdown_rx).run());

        let runtime = Self {
            state: AppState::new(TransactionService::new(ledger.clone(), bus.clone(), config)),
            bus,
            shutdown_tx,
            worker,
        };

        if config.recover_on_startup {
            if let Err(e) = recover_pending_settlements(&ledger, &runtime.bus).await {
                tracing::error!(error = %e, "Settlement recovery failed");
                runtime.shutdown().await;
                return Err(e);
            }
        }

        Ok(runtime)
    }

    /// Stop the worker first, then close the bus.
    ///
    /// Events still queued at this point are not settled in this run; their
    /// outbox entries are picked up by the next startup's recovery.
    pub async fn shutdown(self) {
        if self.shutdown_tx.send(true).is_err() {
            tracing::debug!("Settlement worker already stopped");
        }
        if let Err(e) = self.worker.await {
            tracing::error!(error = %e, "Settlement worker task failed");
        }
        self.bus.close().await;
        tracing::info!("Settlement pipeline stopped");
    }
}

/// Open the configured accounts that the ledger does not know yet.
pub async fn seed_accounts(
    ledger: &SharedLedger,
    accounts: &[SeedAccount],
) -> Result<(), StoreError> {
    for seed in accounts {
        match ledger.insert_account(Account::open(seed.id, seed.balance)).await {
            Ok(()) => {
                tracing::info!(account_id = %seed.id, balance = seed.balance, "Account opened");
            }
            Err(StoreError::DuplicateKey(_)) => {
                tracing::debug!(account_id = %seed.id, "Account already exists, skipping");
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
