use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{
    bar::Bar,
    interval::{Interval, IntervalError},
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Caller input that was rejected before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("instrument_token is required")]
    MissingToken,

    #[error("from_date and to_date are required")]
    MissingDates,

    #[error(transparent)]
    Interval(#[from] IntervalError),

    #[error("Invalid date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
}

/// Raw parameters for a historical candles request, as a caller supplies them.
///
/// Every field is optional so that missing input is reported by
/// [`HistoricalRequest::validate`] instead of by the type system at the call
/// site (CLI flags, JSON batch files).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HistoricalRequest {
    pub instrument_token: Option<u64>,
    /// Inclusive start date, `YYYY-MM-DD`.
    pub from_date: Option<String>,
    /// Inclusive end date, `YYYY-MM-DD`.
    pub to_date: Option<String>,
    /// One of the [`Interval`] wire names.
    pub interval: Option<String>,
    /// Stitch expired futures contracts into one continuous series.
    #[serde(default)]
    pub continuous: bool,
    /// Include open interest as a seventh candle column.
    #[serde(default)]
    pub oi: bool,
}

impl HistoricalRequest {
    pub fn new(
        instrument_token: u64,
        from_date: impl Into<String>,
        to_date: impl Into<String>,
        interval: impl Into<String>,
    ) -> Self {
        Self {
            instrument_token: Some(instrument_token),
            from_date: Some(from_date.into()),
            to_date: Some(to_date.into()),
            interval: Some(interval.into()),
            continuous: false,
            oi: false,
        }
    }

    /// Request for an already-typed date window.
    pub fn for_window(instrument_token: u64, from: NaiveDate, to: NaiveDate, interval: Interval) -> Self {
        Self::new(
            instrument_token,
            from.format(DATE_FORMAT).to_string(),
            to.format(DATE_FORMAT).to_string(),
            interval.as_str(),
        )
    }

    /// Checks the request in a fixed order: token, date pair, interval
    /// presence, interval membership, then date format.
    pub fn validate(&self) -> Result<HistoricalQuery, ValidationError> {
        let instrument_token = match self.instrument_token {
            Some(token) if token != 0 => token,
            _ => return Err(ValidationError::MissingToken),
        };

        let (from_raw, to_raw) = match (non_blank(&self.from_date), non_blank(&self.to_date)) {
            (Some(from), Some(to)) => (from, to),
            _ => return Err(ValidationError::MissingDates),
        };

        // Blank means missing; anything else must match a wire name exactly.
        let interval = self
            .interval
            .as_deref()
            .filter(|raw| !raw.trim().is_empty())
            .ok_or(IntervalError::Missing)?
            .parse::<Interval>()?;

        Ok(HistoricalQuery {
            instrument_token,
            from_date: parse_date(from_raw)?,
            to_date: parse_date(to_raw)?,
            interval,
            continuous: self.continuous,
            oi: self.oi,
        })
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}

/// A validated historical request, ready to be sent upstream.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HistoricalQuery {
    pub instrument_token: u64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub interval: Interval,
    pub continuous: bool,
    pub oi: bool,
}

impl HistoricalQuery {
    pub fn from_param(&self) -> String {
        self.from_date.format(DATE_FORMAT).to_string()
    }

    pub fn to_param(&self) -> String {
        self.to_date.format(DATE_FORMAT).to_string()
    }
}

/// Successful historical response: the bars plus an echo of the query.
#[derive(Clone, Debug, Serialize)]
pub struct HistoricalData {
    pub data: Vec<Bar>,
    pub instrument_token: u64,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub interval: Interval,
    pub continuous: bool,
    pub oi: bool,
    pub count: usize,
}

impl HistoricalData {
    pub fn new(query: HistoricalQuery, data: Vec<Bar>) -> Self {
        Self {
            count: data.len(),
            data,
            instrument_token: query.instrument_token,
            from_date: query.from_date,
            to_date: query.to_date,
            interval: query.interval,
            continuous: query.continuous,
            oi: query.oi,
        }
    }
}
