//! Shipment tracking attached to orders.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::SqliteConnection;
use tracing::info;

use super::{Result, ServiceError};
use crate::domain::{Logistics, LogisticsStatus, LogisticsTrace, LogisticsUpdate};
use crate::storage::{self, SqliteStorage};

/// Description of the trace written when a logistics record is opened.
const CREATED_DESCRIPTION: &str = "logistics record created";

/// Inserts a logistics record for an order together with its first trace.
pub(crate) async fn open_logistics(
    conn: &mut SqliteConnection,
    order_id: i64,
    fields: &LogisticsUpdate,
    now: DateTime<Utc>,
) -> Result<i64> {
    let logistics_id = storage::insert_logistics(conn, order_id, fields, now).await?;
    storage::insert_trace(
        conn,
        logistics_id,
        &fields.carrier,
        &fields.status,
        CREATED_DESCRIPTION,
        now,
    )
    .await?;

    Ok(logistics_id)
}

/// LogisticsService maintains the shipment record of each order and its
/// append-only trace history.
#[derive(Clone)]
pub struct LogisticsService {
    storage: SqliteStorage,
}

impl LogisticsService {
    pub fn new(storage: SqliteStorage) -> Self {
        Self { storage }
    }

    /// Opens the logistics record of an order that does not have one yet.
    pub async fn create_logistics(
        &self,
        order_id: i64,
        carrier: &str,
        tracking_no: &str,
        shipping_fee: Decimal,
    ) -> Result<Logistics> {
        let mut tx = self.storage.begin().await?;

        if storage::get_order(&mut tx, order_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("order {}", order_id)));
        }
        if storage::get_logistics_by_order(&mut tx, order_id).await?.is_some() {
            return Err(ServiceError::InvalidRequest(format!(
                "order {} already has a logistics record",
                order_id
            )));
        }

        let fields = LogisticsUpdate::new(carrier, tracking_no, LogisticsStatus::Pending)
            .with_shipping_fee(shipping_fee);
        let logistics_id = open_logistics(&mut tx, order_id, &fields, Utc::now()).await?;

        let logistics = storage::get_logistics(&mut tx, logistics_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("logistics {}", logistics_id)))?;
        tx.commit().await?;

        info!(order_id, logistics_id, carrier, "logistics record created");
        Ok(logistics)
    }

    /// Creates or overwrites the logistics record of an order and appends
    /// exactly one trace describing the new status.
    pub async fn update_logistics(
        &self,
        order_id: i64,
        mut update: LogisticsUpdate,
    ) -> Result<Logistics> {
        let now = Utc::now();
        let mut tx = self.storage.begin().await?;

        if storage::get_order(&mut tx, order_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("order {}", order_id)));
        }

        let existing = storage::get_logistics_by_order(&mut tx, order_id).await?;

        if let Some(ref logistics) = existing {
            update.shipped_at = update.shipped_at.or(logistics.shipped_at);
            update.delivered_at = update.delivered_at.or(logistics.delivered_at);
        }
        if update.status == LogisticsStatus::Shipping && update.shipped_at.is_none() {
            update.shipped_at = Some(now);
        }
        if update.status == LogisticsStatus::Delivered && update.delivered_at.is_none() {
            update.delivered_at = Some(now);
        }

        let logistics_id = match existing {
            Some(ref logistics) => {
                storage::update_logistics_row(&mut tx, logistics.id, &update, now).await?;
                logistics.id
            }
            None => storage::insert_logistics(&mut tx, order_id, &update, now).await?,
        };

        storage::insert_trace(
            &mut tx,
            logistics_id,
            &update.carrier,
            &update.status,
            update.status.description(),
            now,
        )
        .await?;

        let logistics = storage::get_logistics(&mut tx, logistics_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("logistics {}", logistics_id)))?;
        tx.commit().await?;

        info!(
            order_id,
            logistics_id,
            status = %update.status,
            "logistics updated"
        );
        Ok(logistics)
    }

    /// Logistics record of an order, traces newest first.
    pub async fn get_logistics(&self, order_id: i64) -> Result<Logistics> {
        let mut conn = self.storage.acquire().await?;

        storage::get_logistics_by_order(&mut conn, order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("logistics for order {}", order_id)))
    }

    /// Appends a trace to an existing logistics record.
    pub async fn add_trace(
        &self,
        logistics_id: i64,
        location: &str,
        status: LogisticsStatus,
        description: &str,
        trace_time: DateTime<Utc>,
    ) -> Result<LogisticsTrace> {
        let mut conn = self.storage.acquire().await?;

        if storage::get_logistics(&mut conn, logistics_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("logistics {}", logistics_id)));
        }

        let trace = storage::insert_trace(
            &mut conn,
            logistics_id,
            location,
            &status,
            description,
            trace_time,
        )
        .await?;

        Ok(trace)
    }

    /// Resolves the logistics record of an order, then appends a trace to it.
    pub async fn add_trace_for_order(
        &self,
        order_id: i64,
        location: &str,
        status: LogisticsStatus,
        description: &str,
        trace_time: DateTime<Utc>,
    ) -> Result<LogisticsTrace> {
        let logistics_id = {
            let mut conn = self.storage.acquire().await?;
            storage::get_logistics_by_order(&mut conn, order_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::NotFound(format!("logistics for order {}", order_id))
                })?
                .id
        };

        self.add_trace(logistics_id, location, status, description, trace_time)
            .await
    }
}
