//! Configuration loading and validation for the storefront service.
//!
//! Uses serde_yaml to load YAML configuration files. Payment provider
//! secrets are never read from the file, only from environment variables.

mod app;
mod duration;
mod error;
mod payment;
mod storage;

pub use app::AppConfig;
pub use error::ConfigError;
pub use payment::{AlipayConfig, PaymentConfig, WechatConfig};
pub use storage::StorageConfig;

use serde::Deserialize;
use std::{env, fs};

const WECHAT_API_KEY_VAR: &str = "WECHAT_API_KEY";
const ALIPAY_APP_SECRET_VAR: &str = "ALIPAY_APP_SECRET";

/// Root configuration structure.
///
/// Required sections: app, storage.
/// Optional sections: payment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Application-level settings like name and environment.
    pub app: AppConfig,
    /// Database location and pool sizing.
    pub storage: StorageConfig,
    /// Payment providers (optional).
    #[serde(default)]
    pub payment: PaymentConfig,
}

impl Config {
    /// Load configuration from a YAML file at the given path.
    ///
    /// First loads environment variables from `.env` file (if exists),
    /// then loads YAML config and provider secrets from environment variables:
    /// - `WECHAT_API_KEY`
    /// - `ALIPAY_APP_SECRET`
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, then apply environment secrets and validate.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_yaml::from_str(content)?;

        config.load_credentials_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load provider secrets from environment variables.
    fn load_credentials_from_env(&mut self) {
        if let Some(ref mut wechat) = self.payment.wechat {
            if wechat.enabled {
                wechat.api_key = env::var(WECHAT_API_KEY_VAR).unwrap_or_default();
            }
        }

        if let Some(ref mut alipay) = self.payment.alipay {
            if alipay.enabled {
                alipay.app_secret = env::var(ALIPAY_APP_SECRET_VAR).unwrap_or_default();
            }
        }
    }

    /// Validate the configuration.
    ///
    /// An enabled provider always needs its secret: callbacks signed with an
    /// empty key can be forged by anyone.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.app.name.is_empty() {
            return Err(ConfigError::Validation("app.name is required".into()));
        }

        if self.storage.path.is_empty() {
            return Err(ConfigError::Validation("storage.path is required".into()));
        }

        if let Some(max) = self.storage.max_connections {
            if max == 0 {
                return Err(ConfigError::Validation(
                    "storage.max_connections must be positive".into(),
                ));
            }
        }

        if let Some(ref wechat) = self.payment.wechat {
            if wechat.enabled {
                if wechat.app_id.is_empty() || wechat.mch_id.is_empty() {
                    return Err(ConfigError::Validation(
                        "payment.wechat: app_id and mch_id are required".into(),
                    ));
                }
                if wechat.notify_url.is_empty() {
                    return Err(ConfigError::Validation(
                        "payment.wechat: notify_url is required".into(),
                    ));
                }
                if wechat.api_key.is_empty() {
                    return Err(ConfigError::MissingSecret {
                        provider: "wechat",
                        var: WECHAT_API_KEY_VAR,
                    });
                }
            }
        }

        if let Some(ref alipay) = self.payment.alipay {
            if alipay.enabled {
                if alipay.app_id.is_empty() {
                    return Err(ConfigError::Validation(
                        "payment.alipay: app_id is required".into(),
                    ));
                }
                if alipay.notify_url.is_empty() {
                    return Err(ConfigError::Validation(
                        "payment.alipay: notify_url is required".into(),
                    ));
                }
                if alipay.app_secret.is_empty() {
                    return Err(ConfigError::MissingSecret {
                        provider: "alipay",
                        var: ALIPAY_APP_SECRET_VAR,
                    });
                }
            }
        }

        Ok(())
    }
}
