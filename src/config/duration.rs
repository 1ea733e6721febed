//! Serde helper for duration strings such as "10s", "500ms" or "1m".
//!
//! A missing or blank value means zero, which callers treat as "use the default".

use serde::{self, Deserialize, Deserializer};
use std::time::Duration;

/// Nanoseconds per accepted unit. A bare number is seconds.
const UNITS: &[(&str, f64)] = &[
    ("ms", 1e6),
    ("s", 1e9),
    ("", 1e9),
    ("m", 6e10),
    ("h", 3.6e12),
];

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) => parse_duration(&raw).map_err(serde::de::Error::custom),
        None => Ok(Duration::ZERO),
    }
}

pub(crate) fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(Duration::ZERO);
    }

    let unit = s.trim_start_matches(|c: char| c.is_ascii_digit() || c == '.');
    let value = &s[..s.len() - unit.len()];
    let unit = unit.trim();

    let value: f64 = value
        .parse()
        .map_err(|_| format!("invalid duration value: {}", s))?;
    let nanos = UNITS
        .iter()
        .find_map(|(name, scale)| (*name == unit).then_some(*scale))
        .ok_or_else(|| format!("unknown duration unit: {}", unit))?;

    Duration::try_from_secs_f64(value * nanos / 1e9)
        .map_err(|e| format!("duration {} out of range: {}", s, e))
}
