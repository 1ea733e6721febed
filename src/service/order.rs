//! Order creation and order status management.

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{debug, info, warn};

use super::logistics::open_logistics;
use super::{Result, ServiceError};
use crate::domain::{LineItemRequest, LogisticsStatus, LogisticsUpdate, Order, OrderStatus};
use crate::storage::{self, NewOrder, SqliteStorage};

/// Prefix of every order number.
const ORDER_NUMBER_PREFIX: &str = "ORD";

/// Builds a human-readable order number: prefix, compact timestamp and a
/// three digit random suffix. Collisions are not checked.
pub(crate) fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen_range(0..1000);
    format!(
        "{}{}{:03}",
        ORDER_NUMBER_PREFIX,
        now.format("%Y%m%d%H%M%S"),
        suffix
    )
}

/// OrderService turns line item requests into persisted orders and moves
/// orders through their lifecycle.
#[derive(Clone)]
pub struct OrderService {
    storage: SqliteStorage,
}

impl OrderService {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Creates an order as one atomic unit: stock is reserved for every line,
    /// prices are snapshotted, the order, its items and its logistics record
    /// are inserted and the user's cart is cleared. Any failure rolls the
    /// whole unit back.
    pub async fn create_order(
        &self,
        user_id: i64,
        items: &[LineItemRequest],
        address_id: i64,
    ) -> Result<Order> {
        if items.is_empty() {
            return Err(ServiceError::InvalidRequest("order has no items".into()));
        }
        if let Some(item) = items.iter().find(|i| i.quantity <= 0) {
            return Err(ServiceError::InvalidRequest(format!(
                "quantity for product {} must be positive",
                item.product_id
            )));
        }

        let now = Utc::now();
        let mut tx = self.storage.begin().await?;

        // Stock is reserved before anything is read so the transaction takes
        // the write lock up front.
        let mut lines = Vec::with_capacity(items.len());
        let mut total = Decimal::ZERO;

        for item in items {
            let reserved = storage::reserve_stock(&mut tx, item.product_id, item.quantity).await?;

            let product = storage::get_product(&mut tx, item.product_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("product {}", item.product_id)))?;

            if !reserved {
                warn!(
                    user_id,
                    product_id = product.id,
                    available = product.stock,
                    requested = item.quantity,
                    "insufficient stock"
                );
                return Err(ServiceError::InsufficientStock {
                    product_id: product.id,
                    name: product.name,
                });
            }

            total += product.price * Decimal::from(item.quantity);
            lines.push((product.id, item.quantity, product.price));
        }

        let address = storage::get_address(&mut tx, address_id).await?;
        if !address.is_some_and(|a| a.is_owned_by(user_id)) {
            return Err(ServiceError::InvalidAddress(address_id));
        }

        let order_number = generate_order_number(now);
        let order_id = storage::insert_order(
            &mut tx,
            &NewOrder {
                user_id,
                order_number: order_number.clone(),
                total_amount: total,
                address_id,
                created_at: now,
            },
        )
        .await?;

        for (product_id, quantity, price) in lines {
            storage::insert_order_item(&mut tx, order_id, product_id, quantity, price).await?;
        }

        open_logistics(
            &mut tx,
            order_id,
            &LogisticsUpdate::new("", "", LogisticsStatus::Pending),
            now,
        )
        .await?;

        let cleared = storage::clear_cart(&mut tx, user_id).await?;
        debug!(user_id, cleared, "cart cleared");

        let order = storage::get_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", order_id)))?;

        tx.commit().await?;

        info!(
            order_id,
            user_id,
            order_number = %order_number,
            total = %order.total_amount,
            items = order.items.len(),
            "order created"
        );

        Ok(order)
    }

    /// Creates an order from the selected items of the user's cart.
    pub async fn create_order_from_cart(&self, user_id: i64, address_id: i64) -> Result<Order> {
        let selected = {
            let mut conn = self.storage.acquire().await?;
            storage::selected_cart_items(&mut conn, user_id).await?
        };

        if selected.is_empty() {
            return Err(ServiceError::InvalidRequest(
                "no cart items are selected".into(),
            ));
        }

        let items: Vec<LineItemRequest> = selected
            .iter()
            .map(|c| LineItemRequest::new(c.product_id, c.quantity))
            .collect();

        self.create_order(user_id, &items, address_id).await
    }

    /// Loads an order with its items. A `requester` other than the owner is
    /// refused; `None` is an administrative read.
    pub async fn get_order(&self, order_id: i64, requester: Option<i64>) -> Result<Order> {
        let mut conn = self.storage.acquire().await?;

        let order = storage::get_order(&mut conn, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", order_id)))?;

        if let Some(user_id) = requester {
            if order.user_id != user_id {
                warn!(order_id, user_id, "order accessed by non-owner");
                return Err(ServiceError::PermissionDenied);
            }
        }

        Ok(order)
    }

    /// Orders of a user, newest first.
    pub async fn list_user_orders(&self, user_id: i64) -> Result<Vec<Order>> {
        let mut conn = self.storage.acquire().await?;
        Ok(storage::list_orders_by_user(&mut conn, user_id).await?)
    }

    pub async fn list_orders_by_status(&self, status: OrderStatus) -> Result<Vec<Order>> {
        let mut conn = self.storage.acquire().await?;
        Ok(storage::list_orders_by_status(&mut conn, status).await?)
    }

    /// Sets the order status. Only forward transitions are accepted.
    pub async fn update_order_status(&self, order_id: i64, status: &str) -> Result<Order> {
        let next = OrderStatus::from_str(status).map_err(ServiceError::InvalidRequest)?;

        let mut tx = self.storage.begin().await?;

        let order = storage::get_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", order_id)))?;

        if !order.status.can_transition_to(next) {
            return Err(ServiceError::InvalidOrderStatus(format!(
                "order {} cannot move from {} to {}",
                order_id, order.status, next
            )));
        }

        storage::update_order_status(&mut tx, order_id, next).await?;

        let updated = storage::get_order(&mut tx, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("order {}", order_id)))?;
        tx.commit().await?;

        info!(order_id, from = %order.status, to = %next, "order status updated");
        Ok(updated)
    }
}
