//! Small CSV helpers shared by the snapshot, partition and export files.

use std::{fs, io::ErrorKind, path::Path};

use serde::{de::DeserializeOwned, Serialize};
use snafu::ResultExt;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::io::sink::{CsvSnafu, IoSnafu, StoreError};

/// Creates the parent directory of `path` if it has one.
pub fn ensure_parent_dir(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).context(IoSnafu { path: parent })
        }
        _ => Ok(()),
    }
}

/// Writes `rows` to `path` with a header line, replacing any existing file.
/// Returns the number of rows written.
pub fn write_rows<T, I>(path: &Path, rows: I) -> Result<usize, StoreError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    ensure_parent_dir(path)?;
    let writer = csv::Writer::from_path(path).context(CsvSnafu { path })?;
    serialize_rows(writer, path, rows)
}

/// Like [`write_rows`] but never replaces an existing file.
///
/// Rows go to a temporary file next to `path`, which is moved into place
/// only after every row is flushed. A failed write leaves `path` absent.
/// Returns `Ok(None)` when `path` already exists.
pub fn write_rows_new<T, I>(path: &Path, rows: I) -> Result<Option<usize>, StoreError>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if path.exists() {
        return Ok(None);
    }
    ensure_parent_dir(path)?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut staged = NamedTempFile::new_in(dir).context(IoSnafu { path: dir })?;
    let written = serialize_rows(csv::Writer::from_writer(staged.as_file_mut()), path, rows)?;

    match staged.persist_noclobber(path) {
        Ok(_) => Ok(Some(written)),
        Err(err) if err.error.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(err) => Err(err.error).context(IoSnafu { path }),
    }
}

fn serialize_rows<W, T, I>(mut writer: csv::Writer<W>, path: &Path, rows: I) -> Result<usize, StoreError>
where
    W: std::io::Write,
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    let mut written = 0;
    for row in rows {
        writer.serialize(row).context(CsvSnafu { path })?;
        written += 1;
    }
    writer.flush().context(IoSnafu { path })?;
    Ok(written)
}

/// Reads every row of `path`, skipping rows that fail to decode.
///
/// Skipped rows are logged with their line number. An unreadable file or a
/// missing header is still an error.
pub fn read_rows_lenient<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, StoreError> {
    let mut reader = csv::Reader::from_path(path).context(CsvSnafu { path })?;
    reader.headers().context(CsvSnafu { path })?;

    let mut rows = Vec::new();
    for result in reader.deserialize::<T>() {
        match result {
            Ok(row) => rows.push(row),
            Err(err) if err.is_io_error() => return Err(err).context(CsvSnafu { path }),
            Err(err) => {
                let line = err.position().map(|p| p.line());
                warn!(path = %path.display(), ?line, error = %err, "skipping unreadable row");
            }
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use tempfile::tempdir;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Row {
        symbol: String,
        qty: u32,
    }

    fn row(symbol: &str, qty: u32) -> Row {
        Row {
            symbol: symbol.into(),
            qty,
        }
    }

    #[test]
    fn write_creates_parent_and_overwrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/out/rows.csv");

        assert_eq!(write_rows(&path, [row("A", 1), row("B", 2)]).unwrap(), 2);
        assert_eq!(write_rows(&path, [row("C", 3)]).unwrap(), 1);

        let rows: Vec<Row> = read_rows_lenient(&path).unwrap();
        assert_eq!(rows, vec![row("C", 3)]);
    }

    #[test]
    fn create_new_leaves_existing_file_alone() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");

        assert_eq!(write_rows_new(&path, [row("A", 1)]).unwrap(), Some(1));
        assert_eq!(write_rows_new(&path, [row("B", 2)]).unwrap(), None);

        let rows: Vec<Row> = read_rows_lenient(&path).unwrap();
        assert_eq!(rows, vec![row("A", 1)]);
    }

    enum Staged {
        Good(Row),
        Refused,
    }

    impl Serialize for Staged {
        fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            match self {
                Staged::Good(row) => row.serialize(serializer),
                Staged::Refused => Err(serde::ser::Error::custom("row refused")),
            }
        }
    }

    #[test]
    fn failed_create_new_leaves_no_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap/rows.csv");

        let rows = [Staged::Good(row("A", 1)), Staged::Refused, Staged::Good(row("B", 2))];
        assert!(write_rows_new(&path, rows).is_err());
        assert!(!path.exists());
        assert_eq!(fs::read_dir(path.parent().unwrap()).unwrap().count(), 0);

        assert_eq!(write_rows_new(&path, [row("C", 3)]).unwrap(), Some(1));
        let back: Vec<Row> = read_rows_lenient(&path).unwrap();
        assert_eq!(back, vec![row("C", 3)]);
    }

    #[test]
    fn lenient_read_skips_bad_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        fs::write(&path, "symbol,qty\nA,1\nB,not-a-number\nC,3\n").unwrap();

        let rows: Vec<Row> = read_rows_lenient(&path).unwrap();
        assert_eq!(rows, vec![row("A", 1), row("C", 3)]);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let result: Result<Vec<Row>, _> = read_rows_lenient(&dir.path().join("absent.csv"));
        assert!(result.is_err());
    }
}
