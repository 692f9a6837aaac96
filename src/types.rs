//! Core types for the annobin pipeline
//!
//! This module defines the data structures that flow between stages: labeled
//! intervals from the loader, binary series from the resampler, and merged
//! series carrying a provenance tag.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Provenance tag written when neither channel is active
pub const PROVENANCE_NONE: &str = "None";

/// Provenance tag written when both channels are active
pub const PROVENANCE_BOTH: &str = "Both";

/// One labeled annotation interval, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// Interval start (inclusive)
    pub start_ms: f64,
    /// Interval end (exclusive)
    pub end_ms: f64,
    /// Trimmed, upper-cased label
    pub label: String,
}

impl Interval {
    pub fn new(start_ms: f64, end_ms: f64, label: impl Into<String>) -> Self {
        Self {
            start_ms,
            end_ms,
            label: label.into(),
        }
    }

    /// Whether a bin center falls inside `[start_ms, end_ms)`
    pub fn contains(&self, center_ms: i64) -> bool {
        let c = center_ms as f64;
        self.start_ms <= c && c < self.end_ms
    }
}

/// One bin of a binary series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryRow {
    /// Left boundary of the bin
    pub time_ms: i64,
    /// Bin center, used as the sampling point
    pub center_ms: i64,
    /// 1 when the bin is active, 0 otherwise
    pub binary_value: u8,
}

impl BinaryRow {
    pub fn new(time_ms: i64, center_ms: i64, active: bool) -> Self {
        Self {
            time_ms,
            center_ms,
            binary_value: u8::from(active),
        }
    }

    pub fn key(&self) -> (i64, i64) {
        (self.time_ms, self.center_ms)
    }

    pub fn is_active(&self) -> bool {
        self.binary_value == 1
    }
}

/// Binary series aligned with a time grid, ascending by `time_ms`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinarySeries {
    pub rows: Vec<BinaryRow>,
}

impl BinarySeries {
    pub fn new(rows: Vec<BinaryRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BinaryRow> {
        self.rows.iter()
    }

    /// The `binary_value` column
    pub fn values(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.binary_value).collect()
    }

    /// Number of active bins
    pub fn active_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_active()).count()
    }
}

/// Which channel(s) contributed the active value of a merged bin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Provenance {
    None,
    Channel(String),
    Both,
}

impl Provenance {
    /// Tag for a bin given both channel values and the channel short names
    pub fn classify(primary: bool, secondary: bool, primary_name: &str, secondary_name: &str) -> Self {
        match (primary, secondary) {
            (true, true) => Provenance::Both,
            (true, false) => Provenance::Channel(primary_name.to_string()),
            (false, true) => Provenance::Channel(secondary_name.to_string()),
            (false, false) => Provenance::None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Provenance::None => PROVENANCE_NONE,
            Provenance::Channel(name) => name.as_str(),
            Provenance::Both => PROVENANCE_BOTH,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Provenance> for String {
    fn from(p: Provenance) -> Self {
        match p {
            Provenance::Channel(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl From<String> for Provenance {
    fn from(s: String) -> Self {
        match s.as_str() {
            PROVENANCE_NONE => Provenance::None,
            PROVENANCE_BOTH => Provenance::Both,
            _ => Provenance::Channel(s),
        }
    }
}

/// One bin of a merged series; field order is the CSV column order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedRow {
    pub tier: Provenance,
    pub time_ms: i64,
    pub center_ms: i64,
    pub binary_value: u8,
}

impl MergedRow {
    pub fn key(&self) -> (i64, i64) {
        (self.time_ms, self.center_ms)
    }

    pub fn is_active(&self) -> bool {
        self.binary_value == 1
    }
}

/// Series produced by the channel merger
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedSeries {
    pub rows: Vec<MergedRow>,
}

impl MergedSeries {
    pub fn new(rows: Vec<MergedRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MergedRow> {
        self.rows.iter()
    }

    pub fn values(&self) -> Vec<u8> {
        self.rows.iter().map(|r| r.binary_value).collect()
    }

    /// Drop the provenance column, keeping the merged values as a plain series
    pub fn to_binary(&self) -> BinarySeries {
        BinarySeries::new(
            self.rows
                .iter()
                .map(|r| BinaryRow {
                    time_ms: r.time_ms,
                    center_ms: r.center_ms,
                    binary_value: r.binary_value,
                })
                .collect(),
        )
    }
}
