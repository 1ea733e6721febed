//! Shipment tracking records attached to an order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// LogisticsStatus is the carrier-side state of a shipment.
///
/// Unknown values reported by carriers are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogisticsStatus {
    Pending,
    Processing,
    Shipping,
    Delivered,
    Returned,
    Other(String),
}

impl LogisticsStatus {
    pub fn as_str(&self) -> &str {
        match self {
            LogisticsStatus::Pending => "pending",
            LogisticsStatus::Processing => "processing",
            LogisticsStatus::Shipping => "shipping",
            LogisticsStatus::Delivered => "delivered",
            LogisticsStatus::Returned => "returned",
            LogisticsStatus::Other(s) => s,
        }
    }

    /// Human-readable trace description for this status.
    pub fn description(&self) -> &'static str {
        match self {
            LogisticsStatus::Pending => "logistics record created",
            LogisticsStatus::Processing => "parcel is being processed",
            LogisticsStatus::Shipping => "parcel is in transit",
            LogisticsStatus::Delivered => "parcel delivered",
            LogisticsStatus::Returned => "parcel returned",
            LogisticsStatus::Other(_) => "status updated",
        }
    }
}

impl From<&str> for LogisticsStatus {
    fn from(s: &str) -> Self {
        match s {
            "pending" => LogisticsStatus::Pending,
            "processing" => LogisticsStatus::Processing,
            "shipping" => LogisticsStatus::Shipping,
            "delivered" => LogisticsStatus::Delivered,
            "returned" => LogisticsStatus::Returned,
            other => LogisticsStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for LogisticsStatus {
    fn from(s: String) -> Self {
        LogisticsStatus::from(s.as_str())
    }
}

impl From<LogisticsStatus> for String {
    fn from(status: LogisticsStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for LogisticsStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logistics is the one-per-order shipment record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logistics {
    pub id: i64,
    pub order_id: i64,
    pub tracking_no: String,
    pub carrier: String,
    pub status: LogisticsStatus,
    pub shipping_fee: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    /// Trace history, newest first.
    pub traces: Vec<LogisticsTrace>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// LogisticsTrace is one append-only tracking event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticsTrace {
    pub id: i64,
    pub logistics_id: i64,
    pub location: String,
    pub status: LogisticsStatus,
    pub description: String,
    pub trace_time: DateTime<Utc>,
}

/// New shipment fields applied by an upsert.
#[derive(Debug, Clone)]
pub struct LogisticsUpdate {
    pub tracking_no: String,
    pub carrier: String,
    pub status: LogisticsStatus,
    pub shipping_fee: Decimal,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl LogisticsUpdate {
    pub fn new(
        carrier: impl Into<String>,
        tracking_no: impl Into<String>,
        status: impl Into<LogisticsStatus>,
    ) -> Self {
        Self {
            tracking_no: tracking_no.into(),
            carrier: carrier.into(),
            status: status.into(),
            shipping_fee: Decimal::ZERO,
            shipped_at: None,
            delivered_at: None,
        }
    }

    pub fn with_shipping_fee(mut self, fee: Decimal) -> Self {
        self.shipping_fee = fee;
        self
    }
}
