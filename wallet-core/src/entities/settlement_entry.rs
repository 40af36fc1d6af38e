use uuid::Uuid;

/// Durable outbox row for a transfer awaiting settlement.
///
/// Written next to the pending transaction record and removed once the
/// settlement worker has flipped the record to success. Anything left in the
/// outbox at startup is re-published.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SettlementEntry {
    pub transaction_id: Uuid,
    pub source_account_id: Uuid,
    pub target_account_id: Uuid,
    pub amount: i64,
    pub created_at: time::OffsetDateTime,
}
