//! WeChat Pay native (QR code) adapter.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client as HttpClient, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use super::sign;
use super::{ApiError, CallbackFields, GatewayError, PaymentGateway, Result};
use crate::config::WechatConfig;
use crate::domain::{CallbackOutcome, PaymentMethod, PaymentStatus};

/// Production WeChat Pay API endpoint.
const BASE_API_URL: &str = "https://api.mch.weixin.qq.com";

const NATIVE_PAY_PATH: &str = "/v3/pay/transactions/native";

const AUTH_SCHEME: &str = "WECHATPAY2-HMAC-SHA256";

#[derive(Serialize)]
struct NativePayRequest<'a> {
    appid: &'a str,
    mchid: &'a str,
    description: String,
    out_trade_no: &'a str,
    /// Local payment id, echoed back in the notification.
    attach: String,
    notify_url: &'a str,
    amount: NativePayAmount,
}

#[derive(Serialize)]
struct NativePayAmount {
    /// In fen.
    total: i64,
    currency: &'static str,
}

#[derive(Deserialize)]
struct NativePayResponse {
    code_url: String,
}

/// WechatGateway creates native payments over the WeChat Pay API and
/// verifies its notifications.
pub struct WechatGateway {
    app_id: String,
    mch_id: String,
    notify_url: String,
    base_url: String,
    api_key: String,
    http_client: HttpClient,
}

impl WechatGateway {
    /// Creates a new adapter. Every request is bounded by `timeout`.
    pub fn new(config: &WechatConfig, timeout: Duration) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(GatewayError::Config("wechat api_key is empty".into()));
        }

        let http_client = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            app_id: config.app_id.clone(),
            mch_id: config.mch_id.clone(),
            notify_url: config.notify_url.clone(),
            base_url: config
                .gateway_url
                .clone()
                .unwrap_or_else(|| BASE_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: config.api_key.clone(),
            http_client,
        })
    }

    /// Builds the Authorization header for an outbound request.
    ///
    /// Signed message: METHOD\nPATH\nTIMESTAMP\nNONCE\nBODY\n
    fn authorization(&self, path: &str, body: &str) -> Result<String> {
        let timestamp = chrono::Utc::now().timestamp();
        let nonce = sign::nonce();
        let message = format!("POST\n{}\n{}\n{}\n{}\n", path, timestamp, nonce, body);
        let signature = base64::engine::general_purpose::STANDARD
            .encode(sign::hmac_sha256(&self.api_key, &message)?);

        Ok(format!(
            r#"{} mchid="{}",nonce_str="{}",timestamp="{}",signature="{}""#,
            AUTH_SCHEME, self.mch_id, nonce, timestamp, signature
        ))
    }

    /// Creates a GatewayError from an error response.
    fn parse_error_response(&self, status: StatusCode, body: &[u8]) -> GatewayError {
        #[derive(Deserialize)]
        struct ErrorResponse {
            code: Option<String>,
            message: Option<String>,
        }

        let api_err = match serde_json::from_slice::<ErrorResponse>(body) {
            Ok(resp) => ApiError {
                code: resp.code.unwrap_or_else(|| status.as_u16().to_string()),
                message: resp
                    .message
                    .unwrap_or_else(|| String::from_utf8_lossy(body).to_string()),
            },
            Err(_) => ApiError {
                code: status.as_u16().to_string(),
                message: String::from_utf8_lossy(body).to_string(),
            },
        };

        warn!(code = %api_err.code, message = %api_err.message, "wechat api error");

        GatewayError::Api(api_err)
    }

    /// Expected signature of a notification: uppercase hex HMAC-SHA256 over
    /// the sorted fields with `&key=SECRET` appended.
    fn callback_payload(&self, fields: &CallbackFields) -> String {
        format!(
            "{}&key={}",
            sign::canonical_string(fields, &["sign"]),
            self.api_key
        )
    }
}

#[async_trait]
impl PaymentGateway for WechatGateway {
    async fn create_payment(
        &self,
        payment_id: i64,
        amount: Decimal,
        order_number: &str,
    ) -> Result<String> {
        let request = NativePayRequest {
            appid: &self.app_id,
            mchid: &self.mch_id,
            description: format!("Order {}", order_number),
            out_trade_no: order_number,
            attach: payment_id.to_string(),
            notify_url: &self.notify_url,
            amount: NativePayAmount {
                total: sign::to_cents(amount)?,
                currency: "CNY",
            },
        };

        let body = serde_json::to_string(&request)?;
        let authorization = self.authorization(NATIVE_PAY_PATH, &body)?;
        let url = format!("{}{}", self.base_url, NATIVE_PAY_PATH);

        debug!(payment_id, order_number, "sending wechat native pay request");

        let response = self
            .http_client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if status.is_client_error() || status.is_server_error() {
            return Err(self.parse_error_response(status, &body));
        }

        let resp: NativePayResponse = serde_json::from_slice(&body)?;
        Ok(resp.code_url)
    }

    fn verify_callback(&self, fields: &CallbackFields) -> Result<CallbackOutcome> {
        let signature = sign::required(fields, "sign")?;
        let signature = hex::decode(signature)
            .map_err(|_| GatewayError::MalformedCallback("sign is not hex".into()))?;

        sign::verify_hmac_sha256(&self.api_key, &self.callback_payload(fields), &signature)?;

        let app_id = sign::required(fields, "appid")?;
        let mch_id = sign::required(fields, "mch_id")?;
        if app_id != self.app_id || mch_id != self.mch_id {
            return Err(GatewayError::MalformedCallback(
                "notification is addressed to another merchant".into(),
            ));
        }

        let payment_id = sign::required(fields, "attach")?
            .parse::<i64>()
            .map_err(|_| GatewayError::MalformedCallback("attach is not a payment id".into()))?;
        let trade_no = sign::required(fields, "transaction_id")?.to_string();
        let total_fee = sign::required(fields, "total_fee")?
            .parse::<i64>()
            .map_err(|_| GatewayError::MalformedCallback("total_fee is not in fen".into()))?;

        let status = match sign::required(fields, "result_code")? {
            "SUCCESS" => PaymentStatus::Paid,
            _ => PaymentStatus::Failed,
        };

        Ok(CallbackOutcome {
            payment_id,
            trade_no,
            status,
            amount: Decimal::new(total_fee, 2),
        })
    }

    fn method(&self) -> PaymentMethod {
        PaymentMethod::Wechat
    }
}

/// Signs notification fields the way WeChat does. Used to build fixtures.
#[cfg(test)]
pub(crate) fn sign_fields(api_key: &str, fields: &CallbackFields) -> String {
    let payload = format!("{}&key={}", sign::canonical_string(fields, &["sign"]), api_key);
    hex::encode_upper(sign::hmac_sha256(api_key, &payload).unwrap_or_default())
}
