//! In-process publish/subscribe between the request path and settlement.
//!
//! # Event Flow
//!
//! 1. `TransactionService::process_transfer` persists a pending record and
//!    publishes `Event::Transfer`
//! 2. `SettlementWorker` drains its `Subscription`, moves the balances and
//!    marks the record settled
//!
//! The bus is an explicit value created at startup and handed to both
//! sides; there is no global subscriber registry.

pub mod channels;
pub mod types;

pub use channels::{DEFAULT_SUBSCRIBER_CAPACITY, EventBus, PublishPolicy, Subscription};
pub use types::{Event, EventKind, TransferEvent};
