//! Payment provider adapters.
//!
//! Each provider turns a local payment into something the buyer can pay
//! (a redirect URL or a QR code link) and authenticates the asynchronous
//! notifications the provider sends back.

mod alipay;
mod sign;
mod wechat;

pub use alipay::AlipayGateway;
pub use wechat::WechatGateway;

#[cfg(test)]
pub(crate) use alipay::sign_fields as sign_alipay_fields;
#[cfg(test)]
pub(crate) use wechat::sign_fields as sign_wechat_fields;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::PaymentConfig;
use crate::domain::{CallbackOutcome, PaymentMethod};

/// Default bound for one outbound provider request.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Raw key/value pairs of a provider callback, sorted by key.
pub type CallbackFields = BTreeMap<String, String>;

/// Error body returned by a provider API.
#[derive(Debug, Error)]
#[error("provider api error {code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The callback signature does not match the provider secret.
    #[error("invalid callback signature")]
    InvalidSignature,

    /// The callback is missing fields or carries unexpected values.
    #[error("malformed callback: {0}")]
    MalformedCallback(String),

    #[error("amount cannot be charged: {0}")]
    InvalidAmount(String),

    #[error("gateway config error: {0}")]
    Config(String),

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// PaymentGateway is implemented once per payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Builds the provider payment request for a local payment and returns
    /// the URL (or code link) the buyer completes the payment with.
    /// Never touches local state.
    async fn create_payment(
        &self,
        payment_id: i64,
        amount: Decimal,
        order_number: &str,
    ) -> Result<String>;

    /// Authenticates a callback and extracts the local payment id, the
    /// provider trade number and the resulting status (paid or failed).
    /// Unverified fields must never be trusted.
    fn verify_callback(&self, fields: &CallbackFields) -> Result<CallbackOutcome>;

    /// Canonical audit representation of the raw callback, regardless of
    /// whether it verifies.
    fn serialize_callback(&self, fields: &CallbackFields) -> String {
        let object: serde_json::Map<String, serde_json::Value> = fields
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();
        serde_json::Value::Object(object).to_string()
    }

    /// Payment method served by this gateway.
    fn method(&self) -> PaymentMethod;
}

/// Gateways holds at most one adapter per payment method.
#[derive(Clone, Default)]
pub struct Gateways {
    wechat: Option<Arc<dyn PaymentGateway>>,
    alipay: Option<Arc<dyn PaymentGateway>>,
}

impl Gateways {
    /// Builds adapters for every enabled provider in the configuration.
    pub fn from_config(config: &PaymentConfig) -> Result<Self> {
        let timeout = if config.timeout.is_zero() {
            DEFAULT_REQUEST_TIMEOUT
        } else {
            config.timeout
        };

        let mut gateways = Self::default();

        if let Some(ref wechat) = config.wechat {
            if wechat.enabled {
                gateways = gateways.with(Arc::new(WechatGateway::new(wechat, timeout)?));
            }
        }

        if let Some(ref alipay) = config.alipay {
            if alipay.enabled {
                gateways = gateways.with(Arc::new(AlipayGateway::new(alipay)?));
            }
        }

        Ok(gateways)
    }

    /// Registers an adapter under the method it serves, replacing any previous one.
    pub fn with(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        match gateway.method() {
            PaymentMethod::Wechat => self.wechat = Some(gateway),
            PaymentMethod::Alipay => self.alipay = Some(gateway),
        }
        self
    }

    /// Returns the adapter for a method, if that provider is enabled.
    pub fn get(&self, method: PaymentMethod) -> Option<&dyn PaymentGateway> {
        match method {
            PaymentMethod::Wechat => self.wechat.as_deref(),
            PaymentMethod::Alipay => self.alipay.as_deref(),
        }
    }

    /// Methods with a registered adapter.
    pub fn enabled(&self) -> Vec<PaymentMethod> {
        [PaymentMethod::Wechat, PaymentMethod::Alipay]
            .into_iter()
            .filter(|m| self.get(*m).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests;
