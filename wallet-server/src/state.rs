//! Application state shared across all request handlers.

use wallet_core::services::TransactionService;

/// Application state that is shared across all request handlers.
///
/// This is cloneable and cheap to pass around (everything is behind Arc).
#[derive(Clone)]
pub struct AppState {
    /// Balance operations and history, backed by the configured ledger.
    pub service: TransactionService,
}

impl AppState {
    pub fn new(service: TransactionService) -> Self {
        Self { service }
    }
}
