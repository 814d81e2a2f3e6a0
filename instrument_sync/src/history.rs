//! Trailing-window bar fetch over a list of instruments.
//!
//! Instruments are processed one at a time. A failed instrument is logged
//! and counted, never fatal; an instrument with no bars is skipped. The
//! collected series can then be exported as one combined CSV table.

use std::path::Path;

use chrono::{Days, Local, NaiveDate};
use kite_ingestor::{
    io::{
        sink::{CsvBarSink, DataSink, StoreError},
        table::read_rows_lenient,
    },
    models::{
        bar_series::BarSeries, instrument::Instrument, interval::Interval,
        request_params::HistoricalRequest,
    },
    providers::{historical_data, HistoricalProvider},
};
use serde::Serialize;
use tracing::{info, warn};

/// Inclusive date window and bar interval for a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HistoryWindow {
    /// First day requested.
    pub from_date: NaiveDate,
    /// Last day requested.
    pub to_date: NaiveDate,
    /// Bar size.
    pub interval: Interval,
}

impl HistoryWindow {
    /// `today - lookback_days ..= today`.
    pub fn trailing(today: NaiveDate, lookback_days: u32, interval: Interval) -> Self {
        let from_date = today
            .checked_sub_days(Days::new(u64::from(lookback_days)))
            .unwrap_or(NaiveDate::MIN);
        Self {
            from_date,
            to_date: today,
            interval,
        }
    }

    /// Trailing window ending on the local calendar date at call time.
    pub fn trailing_from_today(lookback_days: u32, interval: Interval) -> Self {
        Self::trailing(Local::now().date_naive(), lookback_days, interval)
    }
}

/// One instrument whose fetch failed.
#[derive(Debug, Clone, Serialize)]
pub struct FetchFailure {
    /// Symbol of the failed instrument.
    pub trading_symbol: String,
    /// Token of the failed instrument.
    pub instrument_token: u64,
    /// Provider message.
    pub error: String,
}

/// Outcome of [`fetch_history`].
#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    /// Window every request used.
    pub window: HistoryWindow,
    /// Instruments attempted (after the cap).
    pub requested: usize,
    /// Instruments that returned at least one bar.
    pub fetched: usize,
    /// Instruments that returned no bars.
    pub empty: usize,
    /// Instruments whose request failed.
    pub failed: usize,
    /// Bars collected across all series.
    pub rows: usize,
    /// Details for each failed instrument.
    pub failures: Vec<FetchFailure>,
    /// Non-empty series in processing order. Not part of the JSON report.
    #[serde(skip)]
    pub series: Vec<BarSeries>,
}

/// Loads the instrument list written by the classifier.
pub fn load_instruments(path: &Path) -> Result<Vec<Instrument>, StoreError> {
    read_rows_lenient(path)
}

/// Fetches bars for each instrument in turn.
///
/// `max_instruments` caps how many rows of `instruments` are attempted.
pub async fn fetch_history<P>(
    provider: &P,
    instruments: &[Instrument],
    window: HistoryWindow,
    max_instruments: Option<usize>,
) -> FetchReport
where
    P: HistoricalProvider + ?Sized,
{
    let take = max_instruments.unwrap_or(instruments.len()).min(instruments.len());
    let mut report = FetchReport {
        window,
        requested: take,
        fetched: 0,
        empty: 0,
        failed: 0,
        rows: 0,
        failures: Vec::new(),
        series: Vec::new(),
    };

    info!(
        from = %window.from_date,
        to = %window.to_date,
        interval = %window.interval,
        instruments = take,
        "fetching historical bars"
    );

    for (position, instrument) in instruments.iter().take(take).enumerate() {
        let symbol = instrument.tradingsymbol.as_str();
        let token = instrument.instrument_token;
        let request =
            HistoricalRequest::for_window(token, window.from_date, window.to_date, window.interval);

        match historical_data(provider, &request).await {
            Ok(data) if data.data.is_empty() => {
                report.empty += 1;
                info!(symbol, token, "no bars in window, skipping");
            }
            Ok(data) => {
                report.fetched += 1;
                report.rows += data.count;
                info!(progress = position + 1, of = take, symbol, bars = data.count, "bars fetched");
                report.series.push(BarSeries {
                    trading_symbol: instrument.tradingsymbol.clone(),
                    instrument_token: token,
                    interval: data.interval,
                    bars: data.data,
                });
            }
            Err(err) => {
                report.failed += 1;
                warn!(symbol, token, error = %err, "historical fetch failed, continuing");
                report.failures.push(FetchFailure {
                    trading_symbol: instrument.tradingsymbol.clone(),
                    instrument_token: token,
                    error: err.to_string(),
                });
            }
        }
    }

    info!(
        fetched = report.fetched,
        empty = report.empty,
        failed = report.failed,
        rows = report.rows,
        "historical fetch finished"
    );
    report
}

/// Writes the collected series to `path`. Returns `None` without touching the
/// filesystem when nothing was collected.
pub async fn export(series: &[BarSeries], path: &Path) -> Result<Option<usize>, StoreError> {
    if series.is_empty() {
        info!(path = %path.display(), "no historical data collected, nothing exported");
        return Ok(None);
    }
    CsvBarSink::new(path).write(series).await.map(Some)
}
