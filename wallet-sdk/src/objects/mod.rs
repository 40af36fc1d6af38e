pub mod transaction;

pub use transaction::{
    PaymentRequest, TopUpRequest, TransactionDetailsResponse, TransactionResponse,
    TransactionStatus, TransactionType, TransferRequest, format_timestamp,
};

use serde::{Deserialize, Serialize};

/// Success envelope wrapping every API result.
///
/// ```json
/// { "status": "success", "result": { ... } }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub status: String,
    pub result: T,
}

impl<T> ApiResponse<T> {
    pub fn success(result: T) -> Self {
        Self {
            status: "success".to_string(),
            result,
        }
    }
}

/// Body returned with every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
