//! CSV snapshot of an exchange catalog.
//!
//! [`load_or_fetch`] prefers an existing snapshot file over the network. A
//! file that exists is trusted as-is, however old it is; delete it to force
//! a fresh download.

use std::{path::Path, sync::Arc};

use kite_ingestor::{
    io::{
        sink::StoreError,
        table::{read_rows_lenient, write_rows_new},
    },
    models::instrument::Instrument,
    providers::InstrumentProvider,
};
use serde::Serialize;
use tracing::info;

use crate::{
    catalog::{CatalogCache, InstrumentCatalog},
    error::SyncError,
};

/// Where a catalog returned by [`load_or_fetch`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    /// Read from an existing snapshot file; the network was not used.
    File,
    /// Downloaded, and the snapshot file was written.
    NetworkWritten,
    /// Downloaded, but the file appeared before it could be written.
    NetworkNotWritten,
}

/// Reads a snapshot file. Rows without a usable token are skipped with a warning.
pub fn read_snapshot(path: &Path, exchange: &str) -> Result<InstrumentCatalog, StoreError> {
    let instruments: Vec<Instrument> = read_rows_lenient(path)?;
    Ok(InstrumentCatalog::new(exchange, instruments))
}

/// Writes `instruments` unless `path` already exists. Returns whether it wrote.
pub fn write_snapshot(path: &Path, instruments: &[Instrument]) -> Result<bool, StoreError> {
    Ok(write_rows_new(path, instruments)?.is_some())
}

/// Loads the catalog from `path` if present, otherwise through `cache`, and
/// then writes the snapshot file.
///
/// The file branch does not touch `cache`.
pub async fn load_or_fetch<P>(
    cache: &CatalogCache<P>,
    path: &Path,
) -> Result<(Arc<InstrumentCatalog>, SnapshotOrigin), SyncError>
where
    P: InstrumentProvider + ?Sized,
{
    if path.exists() {
        let catalog = read_snapshot(path, cache.exchange())?;
        info!(path = %path.display(), count = catalog.len(), "instrument catalog loaded from snapshot");
        return Ok((Arc::new(catalog), SnapshotOrigin::File));
    }

    let catalog = cache.get_instruments().await?;
    let origin = if write_snapshot(path, catalog.instruments())? {
        info!(path = %path.display(), count = catalog.len(), "instrument snapshot written");
        SnapshotOrigin::NetworkWritten
    } else {
        info!(path = %path.display(), "snapshot appeared concurrently, leaving it in place");
        SnapshotOrigin::NetworkNotWritten
    };
    Ok((catalog, origin))
}
