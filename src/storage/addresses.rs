//! Addresses table. Only what order creation needs to check ownership.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use super::rows;
use super::StorageError;
use crate::domain::Address;

pub async fn insert_address(
    conn: &mut SqliteConnection,
    user_id: i64,
    receiver: &str,
    phone: &str,
    detail: &str,
) -> Result<Address, StorageError> {
    let result = sqlx::query(
        r#"
        INSERT INTO addresses (user_id, receiver, phone, detail, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(user_id)
    .bind(receiver)
    .bind(phone)
    .bind(detail)
    .bind(rows::format_time(&Utc::now()))
    .execute(&mut *conn)
    .await?;

    Ok(Address {
        id: result.last_insert_rowid(),
        user_id,
        receiver: receiver.to_string(),
        phone: phone.to_string(),
        detail: detail.to_string(),
    })
}

pub async fn get_address(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Address>, StorageError> {
    let row = sqlx::query("SELECT id, user_id, receiver, phone, detail FROM addresses WHERE id = ?")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(Some(Address {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            receiver: row.try_get("receiver")?,
            phone: row.try_get("phone")?,
            detail: row.try_get("detail")?,
        })),
        None => Ok(None),
    }
}
