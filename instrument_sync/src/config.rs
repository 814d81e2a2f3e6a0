//! Pipeline configuration: parsing, normalization, and loading.
//!
//! Every key is optional; a missing file section or key falls back to
//! [`PipelineConfig::default`]. Unknown keys are rejected so a typo does not
//! silently fall back to a default.
//!
//! ```toml
//! exchange = "NSE"
//! snapshot_path = "data/instruments/NSE.csv"
//! lookback_days = 8
//! interval = "day"
//! max_instruments = 5
//! ```

use std::{path::Path, path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use kite_ingestor::models::interval::Interval;
use serde::{Deserialize, Serialize};

/// Settings for the `instrument-sync` stages.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Exchange code whose catalog is used (normalized to upper case).
    pub exchange: String,
    /// Catalog snapshot file. An existing file is reused as-is.
    pub snapshot_path: PathBuf,
    /// Output of the index bucket.
    pub indices_path: PathBuf,
    /// Output of the tradable bucket, and input of the history stage.
    pub tradable_path: PathBuf,
    /// Combined OHLCV export.
    pub bars_path: PathBuf,
    /// JSON artifact written by `run`.
    pub results_path: PathBuf,
    /// Days before today where the history window starts.
    pub lookback_days: u32,
    /// Bar interval for the history stage.
    pub interval: Interval,
    /// Cap on instruments fetched per run; unset fetches all.
    pub max_instruments: Option<usize>,
    /// HTTP timeout in seconds; unset waits indefinitely.
    pub timeout_secs: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exchange: "NSE".into(),
            snapshot_path: "data/instruments/NSE.csv".into(),
            indices_path: "data/partitions/indices.csv".into(),
            tradable_path: "data/partitions/tradable.csv".into(),
            bars_path: "data/bars/ohlcv.csv".into(),
            results_path: "data/results/run.json".into(),
            lookback_days: 8,
            interval: Interval::Day,
            max_instruments: None,
            timeout_secs: None,
        }
    }
}

impl PipelineConfig {
    /// Trims and upper-cases the exchange and checks the numeric limits.
    pub fn normalize(&mut self) -> anyhow::Result<()> {
        self.exchange = self.exchange.trim().to_uppercase();
        if self.exchange.is_empty() {
            bail!("exchange cannot be empty after trimming");
        }
        if self.max_instruments == Some(0) {
            bail!("max_instruments must be at least 1 when set");
        }
        if self.timeout_secs == Some(0) {
            bail!("timeout_secs must be at least 1 when set");
        }
        Ok(())
    }

    /// HTTP timeout for the broker client.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Parse and normalize a configuration from a TOML string.
pub fn load_config_str(toml_str: &str) -> anyhow::Result<PipelineConfig> {
    let mut config: PipelineConfig =
        toml::from_str(toml_str).context("failed to parse pipeline config TOML")?;
    config.normalize().context("invalid pipeline config")?;
    Ok(config)
}

/// Read a TOML file from disk, parse, and normalize it.
pub fn load_config_path(path: impl AsRef<Path>) -> anyhow::Result<PipelineConfig> {
    let text = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("read config file {}", path.as_ref().display()))?;
    load_config_str(&text)
}

/// Loads `path` when given, otherwise returns the defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => load_config_path(path),
        None => Ok(PipelineConfig::default()),
    }
}
