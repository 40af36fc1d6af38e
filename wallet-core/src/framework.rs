//! Database processor handles.
//!
//! SQL operations are modelled as small command structs, each implementing
//! `kanau::processor::Processor<Command> for DatabaseProcessor`. Commands that
//! take part in multi-statement writes also run against a
//! [`TransactionProcessor`] through [`DatabaseAccessor`].

use sqlx::PgPool;

pub trait DatabaseAccessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_>;
}

#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}

impl DatabaseProcessor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Start a transaction on the pool.
    pub async fn begin(&self) -> Result<TransactionProcessor<'static>, sqlx::Error> {
        Ok(TransactionProcessor {
            tx: self.pool.begin().await?,
        })
    }
}

/// An open transaction. Dropping it without [`commit`](Self::commit) rolls
/// every statement back.
pub struct TransactionProcessor<'b> {
    pub tx: sqlx::Transaction<'b, sqlx::Postgres>,
}

impl TransactionProcessor<'_> {
    pub async fn commit(self) -> Result<(), sqlx::Error> {
        self.tx.commit().await
    }
}

impl DatabaseAccessor for DatabaseProcessor {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &self.pool
    }
}

impl<'b> DatabaseAccessor for TransactionProcessor<'b> {
    fn acquire(&mut self) -> impl sqlx::PgExecutor<'_> {
        &mut *self.tx
    }
}
