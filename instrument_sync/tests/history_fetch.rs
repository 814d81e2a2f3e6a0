mod common;

use std::fs;

use chrono::NaiveDate;
use common::{MockBroker, Script, daily_bar, instrument};
use instrument_sync::{
    history::{HistoryWindow, export, fetch_history},
    stats::analyze,
};
use kite_ingestor::{io::sink::read_bar_table, models::interval::Interval};

fn window() -> HistoryWindow {
    HistoryWindow::trailing(NaiveDate::from_ymd_opt(2024, 1, 9).unwrap(), 8, Interval::Day)
}

#[tokio::test]
async fn failures_and_empty_series_do_not_stop_the_batch() {
    let instruments = vec![
        instrument(1, "FAILS", "NSE", 1),
        instrument(2, "QUIET", "NSE", 1),
        instrument(3, "INFY", "NSE", 1),
    ];
    let broker = MockBroker::new(vec![])
        .script(1, Script::Fail("Invalid token"))
        .script(2, Script::Bars(vec![]))
        .script(
            3,
            Script::Bars(vec![
                daily_bar("2024-01-08", 1500.0, 1000),
                daily_bar("2024-01-09", 1510.0, 1200),
            ]),
        );

    let report = fetch_history(&broker, &instruments, window(), None).await;

    assert_eq!(broker.history_calls(), 3);
    assert_eq!(report.requested, 3);
    assert_eq!(report.failed, 1);
    assert_eq!(report.empty, 1);
    assert_eq!(report.fetched, 1);
    assert_eq!(report.rows, 2);
    assert_eq!(report.failures[0].trading_symbol, "FAILS");
    assert_eq!(report.failures[0].error, "Invalid token");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/ohlcv.csv");
    assert_eq!(export(&report.series, &path).await.unwrap(), Some(2));

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "trading_symbol,instrument_token,date,open,high,low,close,volume"
    );
    assert!(lines[1].starts_with("INFY,3,2024-01-08T00:00:00+05:30,"));
    assert!(lines[2].starts_with("INFY,3,2024-01-09T00:00:00+05:30,"));
    assert!(lines[1..].iter().all(|line| line.starts_with("INFY,3,")));

    let back = read_bar_table(&path, Interval::Day).unwrap();
    assert_eq!(back.len(), 1);
    assert_eq!(back[0].trading_symbol, "INFY");
    assert_eq!(back[0].instrument_token, 3);
    assert_eq!(back[0].bars, report.series[0].bars);
}

#[tokio::test]
async fn bar_without_close_is_exported_and_skipped_by_analysis() {
    let mut gap = daily_bar("2024-01-08", 0.0, 0);
    gap.close = f64::NAN;
    let broker = MockBroker::new(vec![]).script(
        7,
        Script::Bars(vec![daily_bar("2024-01-05", 100.0, 10), gap, daily_bar("2024-01-09", 110.0, 30)]),
    );

    let report = fetch_history(&broker, &[instrument(7, "WIPRO", "NSE", 1)], window(), None).await;
    assert_eq!(report.fetched, 1);
    assert_eq!(report.rows, 3);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ohlcv.csv");
    assert_eq!(export(&report.series, &path).await.unwrap(), Some(3));
    let back = read_bar_table(&path, Interval::Day).unwrap();
    assert!(back[0].bars[1].close.is_nan());

    let stats = analyze(&back).unwrap();
    assert_eq!(stats.total_analyzed, 1);
    let wipro = &stats.analysis_results[0];
    assert_eq!(wipro.data_points, 3);
    assert_eq!(wipro.price_analysis.avg_price, 105.0);
    assert_eq!(wipro.volume_analysis.avg_volume, 20.0);
}

#[tokio::test]
async fn cap_limits_requests() {
    let instruments: Vec<_> = (1..=10)
        .map(|token| instrument(token, &format!("SYM{token}"), "NSE", 1))
        .collect();
    let broker = MockBroker::new(vec![]);

    let report = fetch_history(&broker, &instruments, window(), Some(3)).await;

    assert_eq!(broker.history_calls(), 3);
    assert_eq!(report.requested, 3);
    assert_eq!(report.empty, 3);
    assert!(report.series.is_empty());
}

#[tokio::test]
async fn zero_token_is_rejected_before_the_provider() {
    let broker = MockBroker::new(vec![]);
    let report = fetch_history(&broker, &[instrument(0, "BROKEN", "NSE", 1)], window(), None).await;

    assert_eq!(broker.history_calls(), 0);
    assert_eq!(report.failed, 1);
    assert_eq!(report.failures[0].error, "instrument_token is required");
}
