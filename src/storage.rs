//! Persisted series and annotation exports
//!
//! Series are stored as comma-separated tables with a header row:
//! - binary: `time_ms,center_ms,binary_value`
//! - merged: `tier,time_ms,center_ms,binary_value`
//!
//! Writes go to a sibling temporary file that is renamed into place once the
//! whole series has been written.

use crate::error::BinarizeError;
use crate::types::{BinaryRow, BinarySeries, MergedRow, MergedSeries};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Header of a binary series file
pub const BINARY_COLUMNS: [&str; 3] = ["time_ms", "center_ms", "binary_value"];

/// Header of a merged series file
pub const MERGED_COLUMNS: [&str; 4] = ["tier", "time_ms", "center_ms", "binary_value"];

/// Extension of series files
pub const SERIES_EXTENSION: &str = "csv";

/// Read an annotation export as text
pub fn read_export(path: &Path) -> Result<String, BinarizeError> {
    fs::read_to_string(path).map_err(|e| BinarizeError::io(path, e))
}

pub fn read_binary_series(path: &Path) -> Result<BinarySeries, BinarizeError> {
    read_rows::<BinaryRow>(path).map(BinarySeries::new)
}

pub fn read_merged_series(path: &Path) -> Result<MergedSeries, BinarizeError> {
    read_rows::<MergedRow>(path).map(MergedSeries::new)
}

pub fn write_binary_series(path: &Path, series: &BinarySeries) -> Result<(), BinarizeError> {
    write_rows(path, &BINARY_COLUMNS, &series.rows)
}

pub fn write_merged_series(path: &Path, series: &MergedSeries) -> Result<(), BinarizeError> {
    write_rows(path, &MERGED_COLUMNS, &series.rows)
}

/// Create `dir` and its parents if absent
pub fn ensure_dir(dir: &Path) -> Result<(), BinarizeError> {
    fs::create_dir_all(dir).map_err(|e| BinarizeError::io(dir, e))
}

fn read_rows<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, BinarizeError> {
    let file = File::open(path).map_err(|e| BinarizeError::io(path, e))?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(file);
    let mut rows = Vec::new();
    for record in reader.deserialize() {
        rows.push(record?);
    }
    Ok(rows)
}

fn write_rows<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<(), BinarizeError> {
    let tmp = temp_path(path);
    let file = File::create(&tmp).map_err(|e| BinarizeError::io(&tmp, e))?;

    if let Err(e) = write_csv(file, header, rows) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        BinarizeError::io(path, e)
    })
}

fn write_csv<T: Serialize>(file: File, header: &[&str], rows: &[T]) -> Result<(), BinarizeError> {
    // Header is written explicitly so an empty series still has one
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(csv::Error::from)?;
    Ok(())
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}
