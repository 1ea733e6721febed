//! Payment attempts and the provider callbacks recorded against them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// PaymentMethod selects the payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Wechat,
    Alipay,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Wechat => "wechat",
            PaymentMethod::Alipay => "alipay",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "wechat" => Ok(PaymentMethod::Wechat),
            "alipay" => Ok(PaymentMethod::Alipay),
            _ => Err(format!("unsupported payment method: {}", s)),
        }
    }
}

/// PaymentStatus is the state of a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            _ => Err(format!("unknown payment status: {}", s)),
        }
    }
}

/// Payment is one attempt to settle an order through a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub order_id: i64,
    pub method: PaymentMethod,
    /// Always equal to the order total.
    pub amount: Decimal,
    /// Provider transaction id, known once the provider reports back.
    pub trade_no: Option<String>,
    pub status: PaymentStatus,
    /// Set only when the payment becomes paid.
    pub pay_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// PaymentCallback is the audit record of one received provider notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCallback {
    pub id: i64,
    pub payment_id: i64,
    pub trade_no: String,
    pub status: PaymentStatus,
    /// Canonical serialization of the raw callback fields.
    pub raw_data: String,
    pub received_at: DateTime<Utc>,
}

/// Fields extracted from a callback whose signature has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackOutcome {
    pub payment_id: i64,
    pub trade_no: String,
    pub status: PaymentStatus,
    /// Amount the provider reports for the trade.
    pub amount: Decimal,
}

/// Body of a payment creation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub order_id: i64,
    pub method: String,
}
