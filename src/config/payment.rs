//! Payment provider configuration.

use serde::Deserialize;
use std::time::Duration;

use super::duration;

/// Settings shared by all payment providers plus one block per provider.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Upper bound for a single outbound provider request.
    #[serde(default, with = "duration")]
    pub timeout: Duration,
    pub wechat: Option<WechatConfig>,
    pub alipay: Option<AlipayConfig>,
}

/// WeChat Pay merchant settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WechatConfig {
    #[serde(default)]
    pub enabled: bool,
    pub app_id: String,
    pub mch_id: String,
    /// Where WeChat delivers asynchronous payment notifications.
    pub notify_url: String,
    /// Base URL of the WeChat Pay API (overridable for sandboxes).
    pub gateway_url: Option<String>,
    /// Merchant API key (loaded from `WECHAT_API_KEY`).
    #[serde(skip)]
    pub api_key: String,
}

/// Alipay application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AlipayConfig {
    #[serde(default)]
    pub enabled: bool,
    pub app_id: String,
    pub notify_url: String,
    /// Page shown to the buyer after checkout.
    pub return_url: Option<String>,
    pub gateway_url: Option<String>,
    /// Signing secret (loaded from `ALIPAY_APP_SECRET`).
    #[serde(skip)]
    pub app_secret: String,
}
