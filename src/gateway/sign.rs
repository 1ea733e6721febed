//! Canonical parameter strings and HMAC-SHA256 signing shared by providers.

use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::Sha256;

use super::{CallbackFields, GatewayError};

type HmacSha256 = Hmac<Sha256>;

/// Joins non-empty fields as `k=v` pairs sorted by key, skipping `excluded` keys.
pub(crate) fn canonical_string(fields: &CallbackFields, excluded: &[&str]) -> String {
    fields
        .iter()
        .filter(|(k, v)| !v.is_empty() && !excluded.contains(&k.as_str()))
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn hmac_sha256(secret: &str, payload: &str) -> Result<Vec<u8>, GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::Config("invalid HMAC key".into()))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Constant-time check of `signature` against the HMAC of `payload`.
pub(crate) fn verify_hmac_sha256(
    secret: &str,
    payload: &str,
    signature: &[u8],
) -> Result<(), GatewayError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::Config("invalid HMAC key".into()))?;
    mac.update(payload.as_bytes());
    mac.verify_slice(signature)
        .map_err(|_| GatewayError::InvalidSignature)
}

/// Converts a yuan amount into integer fen. Sub-fen precision is rejected.
pub(crate) fn to_cents(amount: Decimal) -> Result<i64, GatewayError> {
    let cents = amount * Decimal::ONE_HUNDRED;
    if !cents.fract().is_zero() || cents.is_sign_negative() {
        return Err(GatewayError::InvalidAmount(amount.to_string()));
    }
    cents
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidAmount(amount.to_string()))
}

/// Random alphanumeric nonce for outbound requests.
pub(crate) fn nonce() -> String {
    use rand::distributions::Alphanumeric;
    use rand::Rng;

    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(32)
        .map(char::from)
        .collect()
}

/// Returns a non-empty callback field or a MalformedCallback error naming it.
pub(crate) fn required<'a>(fields: &'a CallbackFields, key: &str) -> Result<&'a str, GatewayError> {
    fields
        .get(key)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| GatewayError::MalformedCallback(format!("missing field: {}", key)))
}
