//! Optimistic read-modify-write of a single account balance.

use crate::entities::Account;
use crate::store::{LedgerStore, StoreError};
use tracing::debug;
use uuid::Uuid;

/// Result of a successful balance write.
#[derive(Debug, Clone)]
pub(crate) struct BalanceChange {
    pub before: i64,
    /// The account as stored, carrying its new version.
    pub account: Account,
}

#[derive(Debug)]
pub(crate) enum BalanceUpdateError<E> {
    NotFound,
    /// The caller's rule refused the change.
    Rejected(E),
    /// Every attempt lost a version race.
    Contention,
    Store(StoreError),
}

/// Load `account_id`, compute its new balance with `apply`, and save it with
/// a version check. A lost race re-reads the account and re-applies the
/// rule, at most `max_retries` extra times.
pub(crate) async fn update_balance<E>(
    ledger: &dyn LedgerStore,
    account_id: Uuid,
    max_retries: u32,
    mut apply: impl FnMut(&Account) -> Result<i64, E>,
) -> Result<BalanceChange, BalanceUpdateError<E>> {
    for attempt in 0..=max_retries {
        let mut account = ledger
            .get_account(account_id)
            .await
            .map_err(BalanceUpdateError::Store)?
            .ok_or(BalanceUpdateError::NotFound)?;

        let before = account.balance;
        account.balance = apply(&account).map_err(BalanceUpdateError::Rejected)?;

        match ledger.save_account(account).await {
            Ok(saved) => {
                return Ok(BalanceChange {
                    before,
                    account: saved,
                });
            }
            Err(e) if e.is_conflict() => {
                debug!(%account_id, attempt, "Balance write lost a version race, retrying");
            }
            Err(e) => return Err(BalanceUpdateError::Store(e)),
        }
    }
    Err(BalanceUpdateError::Contention)
}
