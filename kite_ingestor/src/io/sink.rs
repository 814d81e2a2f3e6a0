use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::DateTime;
use indexmap::IndexMap;
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::info;

use crate::{
    io::table::ensure_parent_dir,
    models::{bar::Bar, bar_series::BarSeries, interval::Interval},
};

const BASE_COLUMNS: [&str; 8] = [
    "trading_symbol",
    "instrument_token",
    "date",
    "open",
    "high",
    "low",
    "close",
    "volume",
];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StoreError {
    /// Filesystem failure (create dir, open, flush).
    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        source: std::io::Error,
        path: PathBuf,
        backtrace: Backtrace,
    },

    /// CSV encode or decode failure.
    #[snafu(display("CSV error on {}: {source}", path.display()))]
    Csv {
        source: csv::Error,
        path: PathBuf,
        backtrace: Backtrace,
    },

    /// Series with and without open interest cannot share one table.
    #[snafu(display("Schema mismatch: {message}"))]
    SchemaMismatch { message: String, backtrace: Backtrace },

    /// A row of an exported bar file could not be interpreted.
    #[snafu(display("Invalid row at line {line} of {}: {message}", path.display()))]
    InvalidRow {
        path: PathBuf,
        line: u64,
        message: String,
        backtrace: Backtrace,
    },
}

#[async_trait]
pub trait DataSink {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink returns the number of rows written.
    type Output;

    /// Writes a slice of `BarSeries` to the destination.
    async fn write(&self, data: &[BarSeries]) -> Result<Self::Output, StoreError>;
}

/// Writes many series into one long-format CSV table.
///
/// Columns are `trading_symbol, instrument_token, date, open, high, low,
/// close, volume`, plus `oi` when every series carries open interest.
#[derive(Debug, Clone)]
pub struct CsvBarSink {
    path: PathBuf,
}

impl CsvBarSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_sync(&self, data: &[BarSeries]) -> Result<usize, StoreError> {
        let with_oi = uniform_oi(data)?;
        let path = self.path.as_path();
        ensure_parent_dir(path)?;

        let mut writer = csv::Writer::from_path(path).context(CsvSnafu { path })?;
        let mut header: Vec<&str> = BASE_COLUMNS.to_vec();
        if with_oi {
            header.push("oi");
        }
        writer.write_record(&header).context(CsvSnafu { path })?;

        let mut rows = 0;
        for series in data {
            let token = series.instrument_token.to_string();
            for bar in &series.bars {
                let mut record = vec![
                    series.trading_symbol.clone(),
                    token.clone(),
                    bar.date.to_rfc3339(),
                    bar.open.to_string(),
                    bar.high.to_string(),
                    bar.low.to_string(),
                    bar.close.to_string(),
                    bar.volume.to_string(),
                ];
                if with_oi {
                    record.push(bar.oi.unwrap_or_default().to_string());
                }
                writer.write_record(&record).context(CsvSnafu { path })?;
                rows += 1;
            }
        }
        writer.flush().context(IoSnafu { path })?;

        info!(path = %path.display(), series = data.len(), rows, "bar table written");
        Ok(rows)
    }
}

#[async_trait]
impl DataSink for CsvBarSink {
    type Output = usize;

    async fn write(&self, data: &[BarSeries]) -> Result<usize, StoreError> {
        self.write_sync(data)
    }
}

/// Empty series are ignored; the rest must agree on carrying open interest.
fn uniform_oi(data: &[BarSeries]) -> Result<bool, StoreError> {
    let mut with = Vec::new();
    let mut without = Vec::new();
    for series in data.iter().filter(|s| !s.is_empty()) {
        if series.has_oi() {
            with.push(series.trading_symbol.as_str());
        } else {
            without.push(series.trading_symbol.as_str());
        }
    }
    if !with.is_empty() && !without.is_empty() {
        return SchemaMismatchSnafu {
            message: format!(
                "open interest present for [{}] but missing for [{}]",
                with.join(", "),
                without.join(", ")
            ),
        }
        .fail();
    }
    Ok(!with.is_empty())
}

/// Reads a table written by [`CsvBarSink`] back into one series per token,
/// in first-seen order.
pub fn read_bar_table(path: &Path, interval: Interval) -> Result<Vec<BarSeries>, StoreError> {
    let mut reader = csv::Reader::from_path(path).context(CsvSnafu { path })?;
    let headers = reader.headers().context(CsvSnafu { path })?.clone();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let mut indices = Vec::with_capacity(BASE_COLUMNS.len());
    for name in BASE_COLUMNS {
        let index = column(name).ok_or_else(|| {
            InvalidRowSnafu {
                path,
                line: 1u64,
                message: format!("missing column '{name}'"),
            }
            .build()
        })?;
        indices.push(index);
    }
    let oi_index = column("oi");

    let mut series: IndexMap<u64, BarSeries> = IndexMap::new();
    for record in reader.records() {
        let record = record.context(CsvSnafu { path })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let field = |i: usize| record.get(indices[i]).unwrap_or_default().trim();
        let invalid = |message: String| InvalidRowSnafu { path, line, message }.build();

        let token: u64 = field(1)
            .parse()
            .map_err(|_| invalid(format!("bad instrument_token '{}'", field(1))))?;
        let date = DateTime::parse_from_rfc3339(field(2))
            .map_err(|e| invalid(format!("bad date '{}': {e}", field(2))))?;
        let number = |i: usize, name: &str| -> Result<f64, StoreError> {
            field(i)
                .parse::<f64>()
                .map_err(|_| invalid(format!("bad {name} '{}'", field(i))))
        };
        let bar = Bar {
            date,
            open: number(3, "open")?,
            high: number(4, "high")?,
            low: number(5, "low")?,
            close: number(6, "close")?,
            volume: field(7)
                .parse()
                .map_err(|_| invalid(format!("bad volume '{}'", field(7))))?,
            oi: oi_index
                .and_then(|i| record.get(i))
                .and_then(|v| v.trim().parse().ok()),
        };

        series
            .entry(token)
            .or_insert_with(|| BarSeries {
                trading_symbol: field(0).to_string(),
                instrument_token: token,
                interval,
                bars: Vec::new(),
            })
            .bars
            .push(bar);
    }

    Ok(series.into_values().collect())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;

    fn bar(day: u32, close: f64, oi: Option<u64>) -> Bar {
        Bar {
            date: DateTime::parse_from_rfc3339(&format!("2024-01-{day:02}T00:00:00+05:30")).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1000 + day as u64,
            oi,
        }
    }

    fn series(symbol: &str, token: u64, bars: Vec<Bar>) -> BarSeries {
        BarSeries {
            trading_symbol: symbol.into(),
            instrument_token: token,
            interval: Interval::Day,
            bars,
        }
    }

    #[tokio::test]
    async fn writes_long_table_without_oi() {
        let dir = tempdir().unwrap();
        let sink = CsvBarSink::new(dir.path().join("out/bars.csv"));
        let data = vec![
            series("INFY", 408065, vec![bar(1, 1500.0, None), bar(2, 1510.5, None)]),
            series("TCS", 2953217, vec![bar(1, 3500.0, None)]),
        ];

        assert_eq!(sink.write(&data).await.unwrap(), 3);

        let text = fs::read_to_string(sink.path()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "trading_symbol,instrument_token,date,open,high,low,close,volume"
        );
        assert_eq!(
            lines.next().unwrap(),
            "INFY,408065,2024-01-01T00:00:00+05:30,1499,1501,1498,1500,1001"
        );
        assert_eq!(text.lines().count(), 4);

        let back = read_bar_table(sink.path(), Interval::Day).unwrap();
        assert_eq!(back, data);
    }

    #[tokio::test]
    async fn oi_column_only_when_every_series_has_it() {
        let dir = tempdir().unwrap();
        let sink = CsvBarSink::new(dir.path().join("bars.csv"));
        let data = vec![series("NIFTY24JANFUT", 1, vec![bar(1, 21000.0, Some(99))])];

        sink.write(&data).await.unwrap();
        let header = fs::read_to_string(sink.path()).unwrap();
        assert!(header.lines().next().unwrap().ends_with(",volume,oi"));
        assert_eq!(read_bar_table(sink.path(), Interval::Day).unwrap()[0].bars[0].oi, Some(99));
    }

    #[tokio::test]
    async fn mixed_oi_schemas_are_rejected() {
        let dir = tempdir().unwrap();
        let sink = CsvBarSink::new(dir.path().join("bars.csv"));
        let data = vec![
            series("FUT", 1, vec![bar(1, 10.0, Some(5))]),
            series("EQ", 2, vec![bar(1, 10.0, None)]),
        ];

        let err = sink.write(&data).await.unwrap_err();
        assert!(matches!(err, StoreError::SchemaMismatch { .. }));
        assert!(!sink.path().exists());
    }

    #[test]
    fn table_without_required_column_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bars.csv");
        fs::write(&path, "trading_symbol,date\nINFY,2024-01-01T00:00:00+05:30\n").unwrap();

        let err = read_bar_table(&path, Interval::Day).unwrap_err();
        assert!(err.to_string().contains("missing column 'instrument_token'"));
    }
}
