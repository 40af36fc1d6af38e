//! Background processors that consume events from the bus.

pub mod recovery;
pub mod settlement;

pub use recovery::{RecoveryReport, recover_pending_settlements};
pub use settlement::{SettlementError, SettlementWorker, TransferSettler};
