//! End-to-end run: snapshot, classify, fetch history, export, analyze.

use std::{fs, path::Path};

use kite_ingestor::{
    io::table::ensure_parent_dir,
    models::envelope::Envelope,
    providers::{HistoricalProvider, InstrumentProvider},
};
use serde::Serialize;
use tracing::{error, info};

use crate::{
    catalog::{
        CatalogCache,
        snapshot::{SnapshotOrigin, load_or_fetch},
    },
    classify::{PartitionReport, classify, write_partition},
    config::PipelineConfig,
    error::SyncError,
    history::{FetchReport, HistoryWindow, export, fetch_history, load_instruments},
    stats::{AnalysisReport, analyze},
};

/// Headline counts of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Rows in the exchange catalog.
    pub total_instruments_available: usize,
    /// Instruments the history stage attempted.
    pub processed_instruments: usize,
    /// Instruments that returned at least one bar.
    pub successful_historical_data: usize,
    /// Instruments with statistics.
    pub analyzed_instruments: usize,
}

/// Everything a run produced, as written to the result artifact.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    /// Exchange the run used.
    pub exchange: String,
    /// Whether the catalog came from the snapshot file or the network.
    pub snapshot: SnapshotOrigin,
    /// Classifier output counts.
    pub partition: PartitionReport,
    /// History stage counts and failures.
    pub fetch_result: FetchReport,
    /// Rows written to the OHLCV export, if any.
    pub exported_rows: Option<usize>,
    /// Statistics, or why there are none.
    pub analysis_result: Envelope<AnalysisReport>,
    /// Headline counts.
    pub summary: RunSummary,
}

/// Runs every stage with the settings in `config`.
///
/// Individual instrument failures are absorbed by the history stage; only
/// catalog, file or export failures stop the run.
pub async fn run<P>(cache: &CatalogCache<P>, config: &PipelineConfig) -> Result<RunResult, SyncError>
where
    P: InstrumentProvider + HistoricalProvider + ?Sized,
{
    info!(exchange = %config.exchange, "pipeline run started");

    let (catalog, snapshot) = load_or_fetch(cache, &config.snapshot_path).await?;

    let partition = classify(catalog.instruments());
    let partition_report = write_partition(&partition, &config.indices_path, &config.tradable_path)?;

    let instruments = match partition_report.tradable {
        Some(_) => load_instruments(&config.tradable_path)?,
        None => Vec::new(),
    };

    let window = HistoryWindow::trailing_from_today(config.lookback_days, config.interval);
    let fetch_result =
        fetch_history(cache.provider().as_ref(), &instruments, window, config.max_instruments).await;
    let exported_rows = export(&fetch_result.series, &config.bars_path).await?;

    let analysis_result = Envelope::from(analyze(&fetch_result.series));
    let analyzed = analysis_result
        .data
        .as_ref()
        .map_or(0, |report| report.total_analyzed);

    let summary = RunSummary {
        total_instruments_available: catalog.len(),
        processed_instruments: fetch_result.requested,
        successful_historical_data: fetch_result.fetched,
        analyzed_instruments: analyzed,
    };
    info!(
        available = summary.total_instruments_available,
        processed = summary.processed_instruments,
        fetched = summary.successful_historical_data,
        analyzed = summary.analyzed_instruments,
        "pipeline run finished"
    );

    Ok(RunResult {
        exchange: config.exchange.clone(),
        snapshot,
        partition: partition_report,
        fetch_result,
        exported_rows,
        analysis_result,
        summary,
    })
}

/// Serializes `value` as pretty JSON into `path`, creating the parent directory.
pub fn write_artifact<T: Serialize>(path: &Path, value: &T) -> Result<(), SyncError> {
    ensure_parent_dir(path)?;
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).map_err(|source| SyncError::Artifact {
        path: path.display().to_string(),
        source,
    })
}

/// Runs the pipeline and always records the outcome at `config.results_path`.
///
/// The returned envelope is what was written. A failure to write the
/// artifact is logged and does not change the envelope.
pub async fn run_and_record<P>(cache: &CatalogCache<P>, config: &PipelineConfig) -> Envelope<RunResult>
where
    P: InstrumentProvider + HistoricalProvider + ?Sized,
{
    let envelope = Envelope::from(run(cache, config).await);
    match write_artifact(&config.results_path, &envelope) {
        Ok(()) => info!(path = %config.results_path.display(), "results saved"),
        Err(err) => error!(path = %config.results_path.display(), error = %err, "could not save results"),
    }
    envelope
}
