//! Event type definitions.
//!
//! Unlike identifier-only events, a transfer event carries the full pending
//! record plus the target account, because the target is not persisted on
//! the record itself.

use crate::entities::TransactionRecord;
use uuid::Uuid;

/// Routing key for the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Transfer,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Transfer => write!(f, "transfer"),
        }
    }
}

/// Emitted by the transaction service once a pending transfer is persisted.
///
/// Consumed by the settlement worker, which moves the money and finalizes
/// the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferEvent {
    /// The pending record as it was persisted.
    pub record: TransactionRecord,
    /// The account to credit.
    pub target_id: Uuid,
}

/// Anything that can travel over the [`EventBus`](super::EventBus).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Transfer(TransferEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Transfer(_) => EventKind::Transfer,
        }
    }
}

impl From<TransferEvent> for Event {
    fn from(event: TransferEvent) -> Self {
        Event::Transfer(event)
    }
}
