//! Tolerant numeric decoding for instrument files.
//!
//! Snapshot files may have been written by other tools, so a token can show up
//! as `738561`, `"738561"` or `738561.0`. Blank numeric cells decode to zero,
//! except for the instrument token which must be present.

use std::fmt;

use serde::{
    Deserializer,
    de::{self, Visitor},
};

pub fn token<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match deserializer.deserialize_any(NumberVisitor)? {
        Some(value) if value.is_finite() && value >= 1.0 && value.fract() == 0.0 => {
            Ok(value as u64)
        }
        Some(value) => Err(de::Error::custom(format!(
            "instrument_token must be a positive integer, got {value}"
        ))),
        None => Err(de::Error::custom("instrument_token is missing")),
    }
}

pub fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(deserializer.deserialize_any(NumberVisitor)?.unwrap_or(0.0))
}

pub fn u32_or_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    match deserializer.deserialize_any(NumberVisitor)? {
        Some(value) if value >= 0.0 && value <= u32::MAX as f64 && value.fract() == 0.0 => {
            Ok(value as u32)
        }
        Some(value) => Err(de::Error::custom(format!(
            "expected a non-negative integer, got {value}"
        ))),
        None => Ok(0),
    }
}

/// Decodes integers, floats and numeric strings into `Some(f64)`; blank → `None`.
struct NumberVisitor;

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = Option<f64>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number or a numeric string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<f64>()
            .map(Some)
            .map_err(|_| E::custom(format!("'{trimmed}' is not a number")))
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}
