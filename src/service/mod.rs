//! Order lifecycle and payment settlement.
//!
//! Services own the multi-step units: each one opens a transaction on the
//! storage pool, runs the data access functions against it and commits only
//! when every step succeeded.

mod error;
mod logistics;
mod order;
mod payment;

pub use error::ServiceError;
pub use logistics::LogisticsService;
pub use order::OrderService;
pub use payment::PaymentService;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
