use uuid::Uuid;

/// A money-holding account.
///
/// `version` is bumped by the store on every successful write; a write
/// carrying a stale version is rejected (see [`crate::store::StoreError::VersionConflict`]).
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Account {
    pub id: Uuid,
    pub balance: i64,
    pub version: i64,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

impl Account {
    /// A fresh account as created at registration.
    pub fn open(id: Uuid, balance: i64) -> Self {
        let now = time::OffsetDateTime::now_utc();
        Self {
            id,
            balance,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }
}
