//! Payment attempts and the callback audit log.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::rows;
use super::StorageError;
use crate::domain::{Payment, PaymentCallback, PaymentMethod, PaymentStatus};

const PAYMENT_COLUMNS: &str = r#"
    id, order_id, method, amount, trade_no, status, pay_time, created_at, updated_at
"#;

/// Inserts a pending payment attempt.
pub async fn insert_payment(
    conn: &mut SqliteConnection,
    order_id: i64,
    method: PaymentMethod,
    amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Payment, StorageError> {
    let created_at = rows::format_time(&now);

    let result = sqlx::query(
        r#"
        INSERT INTO payments (order_id, method, amount, trade_no, status, pay_time, created_at, updated_at)
        VALUES (?1, ?2, ?3, NULL, ?4, NULL, ?5, ?5)
        "#,
    )
    .bind(order_id)
    .bind(method.as_str())
    .bind(amount.to_string())
    .bind(PaymentStatus::Pending.as_str())
    .bind(&created_at)
    .execute(&mut *conn)
    .await?;

    Ok(Payment {
        id: result.last_insert_rowid(),
        order_id,
        method,
        amount,
        trade_no: None,
        status: PaymentStatus::Pending,
        pay_time: None,
        created_at: now,
        updated_at: now,
    })
}

pub async fn get_payment(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Payment>, StorageError> {
    let row = sqlx::query(&format!("SELECT {} FROM payments WHERE id = ?", PAYMENT_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    row.as_ref().map(parse_payment_row).transpose()
}

/// The most recent payment attempt for an order.
pub async fn get_latest_payment_by_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<Option<Payment>, StorageError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM payments WHERE order_id = ? ORDER BY id DESC LIMIT 1",
        PAYMENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    row.as_ref().map(parse_payment_row).transpose()
}

pub async fn count_payments(conn: &mut SqliteConnection) -> Result<i64, StorageError> {
    let row = sqlx::query("SELECT COUNT(*) as count FROM payments")
        .fetch_one(&mut *conn)
        .await?;

    Ok(row.try_get("count")?)
}

/// Writes the provider-reported status and trade number.
///
/// Pending and failed payments accept any status. Paid and refunded payments
/// only accept a rewrite of their own status under the same trade number, so
/// a late or replayed callback never downgrades them or swaps their provider
/// trade. `pay_time` is stamped on the first transition to paid and kept on
/// rewrites. Returns false when the update was refused.
pub async fn apply_payment_status(
    conn: &mut SqliteConnection,
    id: i64,
    status: PaymentStatus,
    trade_no: &str,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let now = rows::format_time(&now);

    let result = sqlx::query(
        r#"
        UPDATE payments
        SET status = ?1,
            trade_no = ?2,
            pay_time = CASE WHEN ?1 = ?3 THEN COALESCE(pay_time, ?4) ELSE pay_time END,
            updated_at = ?4
        WHERE id = ?5
          AND (status IN (?6, ?7)
               OR (status = ?1 AND (trade_no IS NULL OR trade_no = ?2)))
        "#,
    )
    .bind(status.as_str())
    .bind(trade_no)
    .bind(PaymentStatus::Paid.as_str())
    .bind(&now)
    .bind(id)
    .bind(PaymentStatus::Pending.as_str())
    .bind(PaymentStatus::Failed.as_str())
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Appends a callback audit record. Never updated afterwards.
pub async fn insert_callback(
    conn: &mut SqliteConnection,
    payment_id: i64,
    trade_no: &str,
    status: PaymentStatus,
    raw_data: &str,
    received_at: DateTime<Utc>,
) -> Result<PaymentCallback, StorageError> {
    let result = sqlx::query(
        r#"
        INSERT INTO payment_callbacks (payment_id, trade_no, status, raw_data, received_at)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(payment_id)
    .bind(trade_no)
    .bind(status.as_str())
    .bind(raw_data)
    .bind(rows::format_time(&received_at))
    .execute(&mut *conn)
    .await?;

    Ok(PaymentCallback {
        id: result.last_insert_rowid(),
        payment_id,
        trade_no: trade_no.to_string(),
        status,
        raw_data: raw_data.to_string(),
        received_at,
    })
}

/// Callback audit records of a payment, in arrival order.
pub async fn list_callbacks(
    conn: &mut SqliteConnection,
    payment_id: i64,
) -> Result<Vec<PaymentCallback>, StorageError> {
    let callback_rows = sqlx::query(
        r#"
        SELECT id, payment_id, trade_no, status, raw_data, received_at
        FROM payment_callbacks WHERE payment_id = ? ORDER BY id
        "#,
    )
    .bind(payment_id)
    .fetch_all(&mut *conn)
    .await?;

    callback_rows
        .iter()
        .map(|row| -> Result<PaymentCallback, StorageError> {
            Ok(PaymentCallback {
                id: row.try_get("id")?,
                payment_id: row.try_get("payment_id")?,
                trade_no: row.try_get("trade_no")?,
                status: rows::parsed(row, "status")?,
                raw_data: row.try_get("raw_data")?,
                received_at: rows::time(row, "received_at")?,
            })
        })
        .collect()
}

fn parse_payment_row(row: &SqliteRow) -> Result<Payment, StorageError> {
    Ok(Payment {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        method: rows::parsed(row, "method")?,
        amount: rows::decimal(row, "amount")?,
        trade_no: row.try_get("trade_no")?,
        status: rows::parsed(row, "status")?,
        pay_time: rows::optional_time(row, "pay_time")?,
        created_at: rows::time(row, "created_at")?,
        updated_at: rows::time(row, "updated_at")?,
    })
}
