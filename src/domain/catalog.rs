//! Inventory, address and cart records consumed by order creation.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Product with the fields relevant to inventory and pricing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Current list price.
    pub price: Decimal,
    /// Units on hand, never negative.
    pub stock: i64,
    /// Units sold, never decreases.
    pub sales: i64,
}

/// Shipping address owned by a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub id: i64,
    pub user_id: i64,
    pub receiver: String,
    pub phone: String,
    pub detail: String,
}

impl Address {
    pub fn is_owned_by(&self, user_id: i64) -> bool {
        self.user_id == user_id
    }
}

/// One product line in a user's cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub quantity: i64,
    /// Whether the line takes part in the next checkout.
    pub selected: bool,
}
