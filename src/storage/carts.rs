//! Cart items: per-user product quantities with a selection flag.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::rows;
use super::StorageError;
use crate::domain::CartItem;

/// Adds `quantity` of a product to the cart, merging with an existing line.
/// The line ends up selected.
pub async fn add_cart_item(
    conn: &mut SqliteConnection,
    user_id: i64,
    product_id: i64,
    quantity: i64,
) -> Result<CartItem, StorageError> {
    if quantity <= 0 {
        return Err(StorageError::InvalidData("quantity must be positive".into()));
    }

    let row = sqlx::query(
        r#"
        INSERT INTO cart_items (user_id, product_id, quantity, selected, created_at)
        VALUES (?1, ?2, ?3, 1, ?4)
        ON CONFLICT(user_id, product_id)
        DO UPDATE SET quantity = quantity + excluded.quantity, selected = 1
        RETURNING id, user_id, product_id, quantity, selected
        "#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .bind(rows::format_time(&Utc::now()))
    .fetch_one(&mut *conn)
    .await?;

    parse_cart_row(&row)
}

/// Returns false when the user has no cart line for the product.
pub async fn set_cart_item_selected(
    conn: &mut SqliteConnection,
    user_id: i64,
    product_id: i64,
    selected: bool,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        "UPDATE cart_items SET selected = ?1 WHERE user_id = ?2 AND product_id = ?3",
    )
    .bind(selected)
    .bind(user_id)
    .bind(product_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn list_cart(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<CartItem>, StorageError> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, product_id, quantity, selected
        FROM cart_items WHERE user_id = ? ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(parse_cart_row).collect()
}

pub async fn selected_cart_items(
    conn: &mut SqliteConnection,
    user_id: i64,
) -> Result<Vec<CartItem>, StorageError> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, product_id, quantity, selected
        FROM cart_items WHERE user_id = ? AND selected = 1 ORDER BY id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(parse_cart_row).collect()
}

/// Removes every cart line of the user. Returns the number of lines removed.
pub async fn clear_cart(conn: &mut SqliteConnection, user_id: i64) -> Result<u64, StorageError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected())
}

fn parse_cart_row(row: &SqliteRow) -> Result<CartItem, StorageError> {
    Ok(CartItem {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("quantity")?,
        selected: row.try_get("selected")?,
    })
}
