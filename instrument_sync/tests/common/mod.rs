#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use chrono::DateTime;
use instrument_sync::config::PipelineConfig;
use kite_ingestor::{
    models::{bar::Bar, instrument::Instrument, request_params::HistoricalQuery},
    providers::{ApiSnafu, HistoricalProvider, InstrumentProvider, ProviderError},
};
use tempfile::TempDir;

/// Scripted answer for one instrument token.
#[derive(Clone)]
pub enum Script {
    Fail(&'static str),
    Bars(Vec<Bar>),
}

/// In-memory broker with call counters.
pub struct MockBroker {
    pub listing: Vec<Instrument>,
    pub scripts: HashMap<u64, Script>,
    pub instrument_calls: AtomicUsize,
    pub history_calls: AtomicUsize,
}

impl MockBroker {
    pub fn new(listing: Vec<Instrument>) -> Self {
        Self {
            listing,
            scripts: HashMap::new(),
            instrument_calls: AtomicUsize::new(0),
            history_calls: AtomicUsize::new(0),
        }
    }

    pub fn script(mut self, token: u64, script: Script) -> Self {
        self.scripts.insert(token, script);
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn instrument_calls(&self) -> usize {
        self.instrument_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstrumentProvider for MockBroker {
    async fn instruments(&self, _exchange: &str) -> Result<Vec<Instrument>, ProviderError> {
        self.instrument_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.listing.clone())
    }
}

#[async_trait]
impl HistoricalProvider for MockBroker {
    async fn historical_bars(&self, query: &HistoricalQuery) -> Result<Vec<Bar>, ProviderError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        match self.scripts.get(&query.instrument_token) {
            Some(Script::Fail(message)) => ApiSnafu {
                message: *message,
                error_type: Some("InputException".to_string()),
                status: 400u16,
            }
            .fail(),
            Some(Script::Bars(bars)) => Ok(bars.clone()),
            None => Ok(Vec::new()),
        }
    }
}

pub fn instrument(token: u64, symbol: &str, segment: &str, lot_size: u32) -> Instrument {
    Instrument {
        instrument_token: token,
        exchange_token: (token / 256).to_string(),
        tradingsymbol: symbol.into(),
        name: format!("{symbol} LTD"),
        last_price: 0.0,
        expiry: String::new(),
        strike: 0.0,
        tick_size: 0.05,
        lot_size,
        instrument_type: "EQ".into(),
        segment: segment.into(),
        exchange: "NSE".into(),
    }
}

pub fn daily_bar(date: &str, close: f64, volume: u64) -> Bar {
    Bar {
        date: DateTime::parse_from_rfc3339(&format!("{date}T00:00:00+05:30")).unwrap(),
        open: close - 1.0,
        high: close + 2.0,
        low: close - 3.0,
        close,
        volume,
        oi: None,
    }
}

/// Pipeline settings with every file under a fresh temp directory.
pub struct TestWorkspace {
    pub dir: TempDir, // keep alive for the life of the test
    pub config: PipelineConfig,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let config = PipelineConfig {
            snapshot_path: root.join("instruments/NSE.csv"),
            indices_path: root.join("partitions/indices.csv"),
            tradable_path: root.join("partitions/tradable.csv"),
            bars_path: root.join("bars/ohlcv.csv"),
            results_path: root.join("results/run.json"),
            ..PipelineConfig::default()
        };
        Self { dir, config }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }
}
