//! Canonical in-memory representation of a time-series bar (OHLCV).
//!
//! This struct is the standard output of [`HistoricalProvider`](crate::providers::HistoricalProvider)
//! implementations and the row type of the combined OHLCV export.
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// A single time-series bar (OHLCV) for a given timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time, in the exchange's offset as delivered (IST for Kite).
    pub date: DateTime<FixedOffset>,
    /// Opening price.
    pub open: f64,
    /// Highest price during the bar interval.
    pub high: f64,
    /// Lowest price during the bar interval.
    pub low: f64,
    /// Closing price. NaN when the vendor sent null.
    pub close: f64,
    /// Volume traded during the bar interval. Zero when the vendor sent null.
    pub volume: u64,
    /// Open interest. Only present when the request asked for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oi: Option<u64>,
}
