//! Domain models for orders, inventory, logistics and payments.

mod catalog;
mod logistics;
mod order;
mod payment;

pub use catalog::{Address, CartItem, Product};
pub use logistics::{Logistics, LogisticsStatus, LogisticsTrace, LogisticsUpdate};
pub use order::{
    CreateOrderRequest, LineItemRequest, Order, OrderItem, OrderPaymentStatus, OrderStatus,
};
pub use payment::{
    CallbackOutcome, CreatePaymentRequest, Payment, PaymentCallback, PaymentMethod, PaymentStatus,
};
