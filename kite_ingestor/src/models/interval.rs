use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntervalError {
    #[error("interval is required")]
    Missing,

    #[error("Invalid interval. Valid values: {}", Interval::valid_values())]
    Invalid { value: String },
}

/// Candle interval accepted by the Kite historical endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Interval {
    Minute,
    ThreeMinute,
    FiveMinute,
    TenMinute,
    FifteenMinute,
    ThirtyMinute,
    SixtyMinute,
    Day,
}

impl Interval {
    pub const ALL: [Interval; 8] = [
        Interval::Minute,
        Interval::ThreeMinute,
        Interval::FiveMinute,
        Interval::TenMinute,
        Interval::FifteenMinute,
        Interval::ThirtyMinute,
        Interval::SixtyMinute,
        Interval::Day,
    ];

    /// Wire name used in the historical URL path.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute => "minute",
            Interval::ThreeMinute => "3minute",
            Interval::FiveMinute => "5minute",
            Interval::TenMinute => "10minute",
            Interval::FifteenMinute => "15minute",
            Interval::ThirtyMinute => "30minute",
            Interval::SixtyMinute => "60minute",
            Interval::Day => "day",
        }
    }

    /// Comma-separated list of every accepted wire name, in canonical order.
    pub fn valid_values() -> String {
        Self::ALL
            .iter()
            .map(Interval::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = IntervalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(IntervalError::Missing);
        }
        Self::ALL
            .into_iter()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| IntervalError::Invalid {
                value: s.to_string(),
            })
    }
}

impl TryFrom<String> for Interval {
    type Error = IntervalError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.as_str().to_string()
    }
}
