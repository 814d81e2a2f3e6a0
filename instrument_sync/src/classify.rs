//! Splits a catalog into index instruments and single-lot named instruments.

use std::path::Path;

use kite_ingestor::{
    io::{sink::StoreError, table::write_rows},
    models::instrument::Instrument,
};
use serde::Serialize;
use tracing::{debug, info};

/// Result of [`classify`]. Both buckets keep catalog order.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    /// Rows in the `INDICES` segment.
    pub indices: Vec<Instrument>,
    /// Rows with a lot size of one and a non-blank name.
    pub tradable: Vec<Instrument>,
    /// Rows that matched neither rule.
    pub dropped: usize,
}

/// Row counts written by [`write_partition`]. `None` means the bucket was
/// empty and no file was written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PartitionReport {
    /// Rows written to the indices file.
    pub indices: Option<usize>,
    /// Rows written to the tradable file.
    pub tradable: Option<usize>,
    /// Rows in neither file.
    pub dropped: usize,
}

/// Whether a non-index row belongs in the tradable bucket.
pub fn is_tradable(instrument: &Instrument) -> bool {
    instrument.lot_size == 1 && !instrument.name.trim().is_empty()
}

/// Partitions `instruments` in one pass.
///
/// The index rule is checked first, so an index row is never tradable
/// whatever its lot size.
pub fn classify(instruments: &[Instrument]) -> Partition {
    let mut partition = Partition::default();
    for instrument in instruments {
        if instrument.is_index() {
            partition.indices.push(instrument.clone());
        } else if is_tradable(instrument) {
            partition.tradable.push(instrument.clone());
        } else {
            partition.dropped += 1;
            debug!(
                symbol = %instrument.tradingsymbol,
                lot_size = instrument.lot_size,
                "instrument dropped by classifier"
            );
        }
    }
    info!(
        indices = partition.indices.len(),
        tradable = partition.tradable.len(),
        dropped = partition.dropped,
        "catalog classified"
    );
    partition
}

/// Writes each non-empty bucket to its file, replacing what was there.
pub fn write_partition(
    partition: &Partition,
    indices_path: &Path,
    tradable_path: &Path,
) -> Result<PartitionReport, StoreError> {
    Ok(PartitionReport {
        indices: write_bucket(&partition.indices, indices_path)?,
        tradable: write_bucket(&partition.tradable, tradable_path)?,
        dropped: partition.dropped,
    })
}

fn write_bucket(rows: &[Instrument], path: &Path) -> Result<Option<usize>, StoreError> {
    if rows.is_empty() {
        info!(path = %path.display(), "bucket empty, no file written");
        return Ok(None);
    }
    let written = write_rows(path, rows)?;
    info!(path = %path.display(), rows = written, "bucket written");
    Ok(Some(written))
}
