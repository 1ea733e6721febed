//! Logistics records and their append-only trace history.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use super::rows;
use super::StorageError;
use crate::domain::{Logistics, LogisticsStatus, LogisticsTrace, LogisticsUpdate};

const LOGISTICS_COLUMNS: &str = r#"
    id, order_id, tracking_no, carrier, status, shipping_fee,
    shipped_at, delivered_at, created_at, updated_at
"#;

/// Creates the logistics record of an order and returns its id.
pub async fn insert_logistics(
    conn: &mut SqliteConnection,
    order_id: i64,
    fields: &LogisticsUpdate,
    now: DateTime<Utc>,
) -> Result<i64, StorageError> {
    let now = rows::format_time(&now);

    let result = sqlx::query(
        r#"
        INSERT INTO logistics (
            order_id, tracking_no, carrier, status, shipping_fee,
            shipped_at, delivered_at, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        "#,
    )
    .bind(order_id)
    .bind(&fields.tracking_no)
    .bind(&fields.carrier)
    .bind(fields.status.as_str())
    .bind(fields.shipping_fee.to_string())
    .bind(fields.shipped_at.as_ref().map(rows::format_time))
    .bind(fields.delivered_at.as_ref().map(rows::format_time))
    .bind(&now)
    .execute(&mut *conn)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Overwrites the mutable fields of an existing logistics record.
pub async fn update_logistics_row(
    conn: &mut SqliteConnection,
    id: i64,
    fields: &LogisticsUpdate,
    now: DateTime<Utc>,
) -> Result<bool, StorageError> {
    let result = sqlx::query(
        r#"
        UPDATE logistics
        SET tracking_no = ?1, carrier = ?2, status = ?3, shipping_fee = ?4,
            shipped_at = ?5, delivered_at = ?6, updated_at = ?7
        WHERE id = ?8
        "#,
    )
    .bind(&fields.tracking_no)
    .bind(&fields.carrier)
    .bind(fields.status.as_str())
    .bind(fields.shipping_fee.to_string())
    .bind(fields.shipped_at.as_ref().map(rows::format_time))
    .bind(fields.delivered_at.as_ref().map(rows::format_time))
    .bind(rows::format_time(&now))
    .bind(id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Loads a logistics record by its own id, traces newest first.
pub async fn get_logistics(
    conn: &mut SqliteConnection,
    id: i64,
) -> Result<Option<Logistics>, StorageError> {
    let row = sqlx::query(&format!("SELECT {} FROM logistics WHERE id = ?", LOGISTICS_COLUMNS))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    with_traces(conn, row).await
}

/// Loads the logistics record of an order, traces newest first.
pub async fn get_logistics_by_order(
    conn: &mut SqliteConnection,
    order_id: i64,
) -> Result<Option<Logistics>, StorageError> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM logistics WHERE order_id = ?",
        LOGISTICS_COLUMNS
    ))
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    with_traces(conn, row).await
}

pub async fn insert_trace(
    conn: &mut SqliteConnection,
    logistics_id: i64,
    location: &str,
    status: &LogisticsStatus,
    description: &str,
    trace_time: DateTime<Utc>,
) -> Result<LogisticsTrace, StorageError> {
    let result = sqlx::query(
        r#"
        INSERT INTO logistics_traces (logistics_id, location, status, description, trace_time)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
    )
    .bind(logistics_id)
    .bind(location)
    .bind(status.as_str())
    .bind(description)
    .bind(rows::format_time(&trace_time))
    .execute(&mut *conn)
    .await?;

    Ok(LogisticsTrace {
        id: result.last_insert_rowid(),
        logistics_id,
        location: location.to_string(),
        status: status.clone(),
        description: description.to_string(),
        trace_time,
    })
}

/// Traces of one logistics record, newest first.
pub async fn list_traces(
    conn: &mut SqliteConnection,
    logistics_id: i64,
) -> Result<Vec<LogisticsTrace>, StorageError> {
    let trace_rows = sqlx::query(
        r#"
        SELECT id, logistics_id, location, status, description, trace_time
        FROM logistics_traces WHERE logistics_id = ?
        ORDER BY trace_time DESC, id DESC
        "#,
    )
    .bind(logistics_id)
    .fetch_all(&mut *conn)
    .await?;

    trace_rows.iter().map(parse_trace_row).collect()
}

async fn with_traces(
    conn: &mut SqliteConnection,
    row: Option<SqliteRow>,
) -> Result<Option<Logistics>, StorageError> {
    let Some(row) = row else {
        return Ok(None);
    };

    let mut logistics = parse_logistics_row(&row)?;
    logistics.traces = list_traces(conn, logistics.id).await?;
    Ok(Some(logistics))
}

fn parse_logistics_row(row: &SqliteRow) -> Result<Logistics, StorageError> {
    let status: String = row.try_get("status")?;

    Ok(Logistics {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        tracking_no: row.try_get("tracking_no")?,
        carrier: row.try_get("carrier")?,
        status: LogisticsStatus::from(status),
        shipping_fee: rows::decimal(row, "shipping_fee")?,
        shipped_at: rows::optional_time(row, "shipped_at")?,
        delivered_at: rows::optional_time(row, "delivered_at")?,
        traces: Vec::new(),
        created_at: rows::time(row, "created_at")?,
        updated_at: rows::time(row, "updated_at")?,
    })
}

fn parse_trace_row(row: &SqliteRow) -> Result<LogisticsTrace, StorageError> {
    let status: String = row.try_get("status")?;

    Ok(LogisticsTrace {
        id: row.try_get("id")?,
        logistics_id: row.try_get("logistics_id")?,
        location: row.try_get("location")?,
        status: LogisticsStatus::from(status),
        description: row.try_get("description")?,
        trace_time: rows::time(row, "trace_time")?,
    })
}
