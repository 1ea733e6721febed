//! Configuration error types.

use thiserror::Error;

/// Configuration loading error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadFile(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Validation(String),
    /// An enabled payment provider has no secret in the environment.
    #[error("payment.{provider}: secret not found (set {var} env var)")]
    MissingSecret {
        provider: &'static str,
        var: &'static str,
    },
}
