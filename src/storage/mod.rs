//! Data access for the storefront, backed by SQLite.
//!
//! Every function takes an explicit `&mut SqliteConnection`, so the same
//! call works on a pooled connection or inside an open transaction
//! (`&mut *tx`). Multi-step units are composed by the service layer.

mod addresses;
mod carts;
mod logistics;
mod orders;
mod payments;
mod products;
mod rows;
mod sqlite;

pub use addresses::{get_address, insert_address};
pub use carts::{
    add_cart_item, clear_cart, list_cart, selected_cart_items, set_cart_item_selected,
};
pub use logistics::{
    get_logistics, get_logistics_by_order, insert_logistics, insert_trace, list_traces,
    update_logistics_row,
};
pub use orders::{
    NewOrder, count_orders, get_order, insert_order, insert_order_item, list_orders_by_status,
    list_orders_by_user, mark_order_paid, update_order_status,
};
pub use payments::{
    apply_payment_status, count_payments, get_latest_payment_by_order, get_payment,
    insert_callback, insert_payment, list_callbacks,
};
pub use products::{get_product, insert_product, reserve_stock};
pub use sqlite::{SqliteStorage, SqliteStorageConfig};

/// StorageError represents errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

#[cfg(test)]
mod tests;
