//! Request-facing use cases.

mod balance;
pub mod transaction;

pub(crate) use balance::{BalanceChange, BalanceUpdateError, update_balance};
pub use transaction::{TransactionError, TransactionService};
