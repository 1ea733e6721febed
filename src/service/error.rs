//! Service error types.

use crate::gateway::GatewayError;
use crate::storage::StorageError;

/// Named failures of the order and payment core.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("address {0} does not belong to the user")]
    InvalidAddress(i64),

    #[error("insufficient stock for {name} (product {product_id})")]
    InsufficientStock { product_id: i64, name: String },

    #[error("invalid order status: {0}")]
    InvalidOrderStatus(String),

    #[error("unsupported payment method: {0}")]
    UnsupportedPaymentMethod(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("invalid callback signature")]
    InvalidSignature,

    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    #[error("gateway error: {0}")]
    Gateway(GatewayError),

    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<GatewayError> for ServiceError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidSignature => ServiceError::InvalidSignature,
            GatewayError::MalformedCallback(msg) => ServiceError::MalformedCallback(msg),
            other => ServiceError::Gateway(other),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ServiceError::NotFound(what),
            other => ServiceError::Storage(other),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Storage(StorageError::Database(err))
    }
}
