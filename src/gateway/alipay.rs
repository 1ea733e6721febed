//! Alipay page payment adapter.
//!
//! Payment creation only builds a signed redirect URL; the buyer's browser
//! talks to Alipay directly, so no request leaves this process.

use async_trait::async_trait;
use base64::Engine;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::debug;

use super::sign;
use super::{CallbackFields, GatewayError, PaymentGateway, Result};
use crate::config::AlipayConfig;
use crate::domain::{CallbackOutcome, PaymentMethod, PaymentStatus};

/// Production Alipay gateway.
const BASE_GATEWAY_URL: &str = "https://openapi.alipay.com/gateway.do";

const PAGE_PAY_METHOD: &str = "alipay.trade.page.pay";

const SIGN_TYPE: &str = "HMAC-SHA256";

/// Fields never covered by the signature.
const UNSIGNED_FIELDS: &[&str] = &["sign", "sign_type"];

#[derive(Serialize)]
struct PagePayContent<'a> {
    out_trade_no: &'a str,
    total_amount: String,
    subject: String,
    product_code: &'static str,
    /// Local payment id, echoed back in the notification.
    passback_params: String,
}

/// AlipayGateway builds signed page payment URLs and verifies Alipay
/// notifications.
pub struct AlipayGateway {
    app_id: String,
    notify_url: String,
    return_url: Option<String>,
    gateway_url: String,
    app_secret: String,
}

impl AlipayGateway {
    /// Fails when the app secret is empty, since such callbacks would
    /// verify for anyone.
    pub fn new(config: &AlipayConfig) -> Result<Self> {
        if config.app_secret.is_empty() {
            return Err(GatewayError::Config("alipay app_secret is empty".into()));
        }

        Ok(Self {
            app_id: config.app_id.clone(),
            notify_url: config.notify_url.clone(),
            return_url: config.return_url.clone(),
            gateway_url: config
                .gateway_url
                .clone()
                .unwrap_or_else(|| BASE_GATEWAY_URL.to_string()),
            app_secret: config.app_secret.clone(),
        })
    }

    fn signature(&self, params: &CallbackFields) -> Result<String> {
        let payload = sign::canonical_string(params, UNSIGNED_FIELDS);
        let mac = sign::hmac_sha256(&self.app_secret, &payload)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(mac))
    }
}

#[async_trait]
impl PaymentGateway for AlipayGateway {
    async fn create_payment(
        &self,
        payment_id: i64,
        amount: Decimal,
        order_number: &str,
    ) -> Result<String> {
        let cents = sign::to_cents(amount)?;
        let content = PagePayContent {
            out_trade_no: order_number,
            total_amount: format!("{}.{:02}", cents / 100, cents % 100),
            subject: format!("Order {}", order_number),
            product_code: "FAST_INSTANT_TRADE_PAY",
            passback_params: payment_id.to_string(),
        };

        let mut params = CallbackFields::new();
        params.insert("app_id".into(), self.app_id.clone());
        params.insert("method".into(), PAGE_PAY_METHOD.into());
        params.insert("charset".into(), "utf-8".into());
        params.insert("sign_type".into(), SIGN_TYPE.into());
        params.insert(
            "timestamp".into(),
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        params.insert("version".into(), "1.0".into());
        params.insert("notify_url".into(), self.notify_url.clone());
        if let Some(ref return_url) = self.return_url {
            params.insert("return_url".into(), return_url.clone());
        }
        params.insert("biz_content".into(), serde_json::to_string(&content)?);

        let signature = self.signature(&params)?;
        params.insert("sign".into(), signature);

        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        debug!(payment_id, order_number, "built alipay page pay url");

        Ok(format!("{}?{}", self.gateway_url, query))
    }

    fn verify_callback(&self, fields: &CallbackFields) -> Result<CallbackOutcome> {
        let signature = sign::required(fields, "sign")?;
        let signature = base64::engine::general_purpose::STANDARD
            .decode(signature)
            .map_err(|_| GatewayError::MalformedCallback("sign is not base64".into()))?;

        if let Some(sign_type) = fields.get("sign_type") {
            if !sign_type.is_empty() && sign_type != SIGN_TYPE {
                return Err(GatewayError::MalformedCallback(format!(
                    "unsupported sign_type: {}",
                    sign_type
                )));
            }
        }

        let payload = sign::canonical_string(fields, UNSIGNED_FIELDS);
        sign::verify_hmac_sha256(&self.app_secret, &payload, &signature)?;

        if sign::required(fields, "app_id")? != self.app_id {
            return Err(GatewayError::MalformedCallback(
                "notification is addressed to another application".into(),
            ));
        }

        let payment_id = sign::required(fields, "passback_params")?
            .parse::<i64>()
            .map_err(|_| {
                GatewayError::MalformedCallback("passback_params is not a payment id".into())
            })?;
        let trade_no = sign::required(fields, "trade_no")?.to_string();
        let amount = sign::required(fields, "total_amount")?
            .parse::<Decimal>()
            .map_err(|_| GatewayError::MalformedCallback("total_amount is not a decimal".into()))?;

        let status = match sign::required(fields, "trade_status")? {
            "TRADE_SUCCESS" | "TRADE_FINISHED" => PaymentStatus::Paid,
            "TRADE_CLOSED" => PaymentStatus::Failed,
            other => {
                return Err(GatewayError::MalformedCallback(format!(
                    "unexpected trade_status: {}",
                    other
                )));
            }
        };

        Ok(CallbackOutcome {
            payment_id,
            trade_no,
            status,
            amount,
        })
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Alipay
    }
}

/// Signs notification fields the way Alipay does. Used to build fixtures.
#[cfg(test)]
pub(crate) fn sign_fields(app_secret: &str, fields: &CallbackFields) -> String {
    let payload = sign::canonical_string(fields, UNSIGNED_FIELDS);
    base64::engine::general_purpose::STANDARD
        .encode(sign::hmac_sha256(app_secret, &payload).unwrap_or_default())
}
