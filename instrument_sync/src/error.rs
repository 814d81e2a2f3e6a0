//! Error type shared by the pipeline stages.

use kite_ingestor::{
    io::sink::StoreError,
    providers::{ProviderError, ProviderInitError},
};
use thiserror::Error;

use crate::stats::AnalysisError;

/// Any failure that stops a pipeline stage.
///
/// Per-instrument fetch failures are not represented here; they are logged
/// and counted in [`FetchReport`](crate::history::FetchReport) instead.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The broker call failed (network, vendor error, validation).
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The broker client could not be constructed.
    #[error(transparent)]
    Init(#[from] ProviderInitError),

    /// Reading or writing a CSV file failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Nothing to analyze.
    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    /// Writing the JSON result artifact failed.
    #[error("failed to write {path}: {source}")]
    Artifact {
        /// Destination of the artifact.
        path: String,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Encoding the JSON result artifact failed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
