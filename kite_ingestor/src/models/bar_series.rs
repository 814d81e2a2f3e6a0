//! A collection of time-series bars for one instrument and interval.
use serde::{Deserialize, Serialize};

use crate::models::{bar::Bar, interval::Interval};

/// Represents a complete set of time-series data for a single instrument.
///
/// This struct groups a vector of [`Bar`]s with the owning instrument's symbol
/// and token, making each exported row self-describing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    /// The trading symbol this data represents (e.g., "INFY").
    pub trading_symbol: String,
    /// Kite instrument token of the owning instrument.
    pub instrument_token: u64,
    /// The time interval for each bar in the series.
    pub interval: Interval,
    /// Bars in ascending date order, as returned upstream.
    pub bars: Vec<Bar>,
}

impl BarSeries {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Whether every bar carries open interest.
    pub fn has_oi(&self) -> bool {
        !self.bars.is_empty() && self.bars.iter().all(|bar| bar.oi.is_some())
    }
}
