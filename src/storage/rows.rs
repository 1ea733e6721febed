//! Column decoding shared by the table modules.
//!
//! Decimals are stored as TEXT to keep them exact, timestamps as fixed-width
//! RFC 3339 TEXT so that lexical order matches time order.

use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sqlx::Row;
use sqlx::sqlite::SqliteRow;
use std::str::FromStr;

use super::StorageError;

pub(crate) fn format_time(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decimal(row: &SqliteRow, column: &str) -> Result<Decimal, StorageError> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw)
        .map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
}

pub(crate) fn time(row: &SqliteRow, column: &str) -> Result<DateTime<Utc>, StorageError> {
    let raw: String = row.try_get(column)?;
    parse_time(column, &raw)
}

pub(crate) fn optional_time(
    row: &SqliteRow,
    column: &str,
) -> Result<Option<DateTime<Utc>>, StorageError> {
    let raw: Option<String> = row.try_get(column)?;
    raw.map(|s| parse_time(column, &s)).transpose()
}

/// Decodes a TEXT column into any type with a string-based `FromStr`.
pub(crate) fn parsed<T>(row: &SqliteRow, column: &str) -> Result<T, StorageError>
where
    T: FromStr<Err = String>,
{
    let raw: String = row.try_get(column)?;
    T::from_str(&raw).map_err(StorageError::InvalidData)
}

fn parse_time(column: &str, raw: &str) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StorageError::InvalidData(format!("Invalid {}: {}", column, e)))
}
