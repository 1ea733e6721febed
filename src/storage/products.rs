//! Products table: prices and the inventory ledger.

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};
use tracing::debug;

use super::rows;
use super::StorageError;
use crate::domain::Product;

pub async fn insert_product(
    conn: &mut SqliteConnection,
    name: &str,
    price: Decimal,
    stock: i64,
) -> Result<Product, StorageError> {
    if stock < 0 {
        return Err(StorageError::InvalidData("stock must not be negative".into()));
    }

    let now = rows::format_time(&Utc::now());
    let result = sqlx::query(
        r#"
        INSERT INTO products (name, price, stock, sales, created_at, updated_at)
        VALUES (?1, ?2, ?3, 0, ?4, ?4)
        "#,
    )
    .bind(name)
    .bind(price.to_string())
    .bind(stock)
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(Product {
        id: result.last_insert_rowid(),
        name: name.to_string(),
        price,
        stock,
        sales: 0,
    })
}

pub async fn get_product(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Product>, StorageError> {
    let row = sqlx::query("SELECT id, name, price, stock, sales FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(parse_product_row).transpose()
}

/// Takes `quantity` units out of stock and adds them to sales in one guarded
/// statement. Returns false, changing nothing, when stock is insufficient.
pub async fn reserve_stock(
    conn: &mut SqliteConnection,
    product_id: i64,
    quantity: i64,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE products
        SET stock = stock - ?1, sales = sales + ?1, updated_at = ?3
        WHERE id = ?2 AND stock >= ?1
        "#,
    )
    .bind(quantity)
    .bind(product_id)
    .bind(rows::format_time(&Utc::now()))
    .execute(&mut *conn)
    .await?;

    let applied = result.rows_affected() > 0;
    debug!(product_id, quantity, applied, "Stock reservation");
    Ok(applied)
}

fn parse_product_row(row: &SqliteRow) -> Result<Product, StorageError> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        price: rows::decimal(row, "price")?,
        stock: row.try_get("stock")?,
        sales: row.try_get("sales")?,
    })
}
