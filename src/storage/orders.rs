//! Orders and their line items.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::rows;
use super::StorageError;
use crate::domain::{Order, OrderItem, OrderPaymentStatus, OrderStatus};

const ORDER_COLUMNS: &str = r#"
    id, user_id, order_number, total_amount, status, payment_status,
    address_id, payment_time, created_at, updated_at
"#;

/// Fields of an order row about to be inserted.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub order_number: String,
    pub total_amount: Decimal,
    pub address_id: i64,
    pub created_at: DateTime<Utc>,
}

/// Inserts a pending, unpaid order and returns its id.
pub async fn insert_order(conn: &mut SqliteConnection, order: &NewOrder) -> Result<i64, StorageError> {
    let created_at = rows::format_time(&order.created_at);

    let result = sqlx::query(
        r#"
        INSERT INTO orders (
            user_id, order_number, total_amount, status, payment_status,
            address_id, payment_time, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?7)
        "#,
    )
    .bind(order.user_id)
    .bind(&order.order_number)
    .bind(order.total_amount.to_string())
    .bind(OrderStatus::Pending.as_str())
    .bind(OrderPaymentStatus::Unpaid.as_str())
    .bind(order.address_id)
    .bind(&created_at)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn insert_order_item(
    conn: &mut SqliteConnection,
    order_id: i64,
    product_id: i64,
    quantity: i64,
    price: Decimal,
) -> Result<OrderItem, StorageError> {
    let result = sqlx::query(
        "INSERT INTO order_items (order_id, product_id, quantity, price) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .bind(price.to_string())
    .execute(&mut *conn)
    .await?;

    Ok(OrderItem {
        id: result.last_insert_rowid(),
        order_id,
        product_id,
        quantity,
        price,
    })
}

/// Loads an order together with its line items.
pub async fn get_order(conn: &mut SqliteConnection, id: i64) -> Result<Option<Order>, StorageError> {
    let row = sqlx::query(&format!("SELECT {} FROM orders WHERE id = ?", ORDER_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let mut order = parse_order_row(&row)?;
    order.items = list_order_items(conn, order.id).await?;
    Ok(Some(order))
}

/// Orders of one user, newest first.
pub async fn list_orders_by_user(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<Order>, StorageError> {
    let order_rows = sqlx::query(&format!(
        "SELECT {} FROM orders WHERE user_id = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    with_items(conn, &order_rows).await
}

/// Orders in the given status, newest first.
pub async fn list_orders_by_status(
    conn: &mut SqliteConnection,
    status: OrderStatus,
) -> Result<Vec<Order>, StorageError> {
    let order_rows = sqlx::query(&format!(
        "SELECT {} FROM orders WHERE status = ? ORDER BY created_at DESC, id DESC",
        ORDER_COLUMNS
    ))
    .bind(status.as_str())
    .fetch_all(&mut *conn)
    .await?;

    with_items(conn, &order_rows).await
}

pub async fn count_orders(conn: &mut SqliteConnection) -> Result<i64, StorageError> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM orders")
        .fetch_one(&mut *conn)
        .await?;

    Ok(row.try_get("count")?)
}

/// Overwrites the order status. Returns false if the order does not exist.
pub async fn update_order_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: OrderStatus,
) -> Result<bool, StorageError> {
    let result = sqlx::query("UPDATE orders SET status = ?1, updated_at = ?2 WHERE id = ?3")
        .bind(status.as_str())
        .bind(rows::format_time(&Utc::now()))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Moves a pending order to paid and records when. Orders in any other
/// status are left untouched and false is returned.
pub async fn mark_order_paid(
    conn: &mut SqliteConnection,
    id: i64,
    paid_at: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let paid_at = rows::format_time(&paid_at);

    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?1, payment_status = ?2, payment_time = ?3, updated_at = ?3
        WHERE id = ?4 AND status = ?5
        "#,
    )
    .bind(OrderStatus::Paid.as_str())
    .bind(OrderPaymentStatus::Paid.as_str())
    .bind(&paid_at)
    .bind(id)
    .bind(OrderStatus::Pending.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

async fn list_order_items(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<Vec<OrderItem>, StorageError> {
    let item_rows = sqlx::query(
        "SELECT id, order_id, product_id, quantity, price FROM order_items WHERE order_id = ? ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    item_rows
        .iter()
        .map(|row| -> Result<OrderItem, StorageError> {
            Ok(OrderItem {
                id: row.try_get("id")?,
                order_id: row.try_get("order_id")?,
                product_id: row.try_get("product_id")?,
                quantity: row.try_get("quantity")?,
                price: rows::decimal(row, "price")?,
            })
        })
        .collect()
}

async fn with_items(
    conn: &mut SqliteConnection,
    order_rows: &[SqliteRow],
) -> Result<Vec<Order>, StorageError> {
    let mut orders = Vec::with_capacity(order_rows.len());
    for row in order_rows {
        let mut order = parse_order_row(row)?;
        order.items = list_order_items(conn, order.id).await?;
        orders.push(order);
    }
    Ok(orders)
}

fn parse_order_row(row: &SqliteRow) -> Result<Order, StorageError> {
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        order_number: row.try_get("order_number")?,
        total_amount: rows::decimal(row, "total_amount")?,
        status: rows::parsed(row, "status")?,
        payment_status: rows::parsed(row, "payment_status")?,
        address_id: row.try_get("address_id")?,
        payment_time: rows::optional_time(row, "payment_time")?,
        items: Vec::new(),
        created_at: rows::time(row, "created_at")?,
        updated_at: rows::time(row, "updated_at")?,
    })
}
