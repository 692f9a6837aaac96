//! Adapter for turning annotation exports into tier intervals
//!
//! This is the loading stage of the pipeline: the whole export is parsed
//! against one column layout, then filtered down to a single tier.

use crate::error::BinarizeError;
use crate::schema::annotation::{AnnotationRecord, ColumnLayout};
use crate::types::Interval;

/// Adapter for converting annotation exports to intervals
pub struct AnnotationAdapter;

impl AnnotationAdapter {
    /// Parse every non-blank line of an export
    ///
    /// With [`ColumnLayout::Auto`] the layout is chosen once per file from its
    /// widest row, so short rows in a six-column file keep their alignment.
    pub fn parse_records(
        text: &str,
        layout: ColumnLayout,
    ) -> Result<Vec<AnnotationRecord>, BinarizeError> {
        let rows: Vec<(usize, &str)> = text
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(idx, line)| (idx + 1, line))
            .collect();

        let (widest_line, widest) = rows
            .iter()
            .map(|(line_no, line)| (*line_no, line.split_whitespace().count()))
            .max_by_key(|(_, width)| *width)
            .unwrap_or((0, 0));

        let layout = layout.resolve(widest, widest_line)?;

        rows.into_iter()
            .map(|(line_no, line)| AnnotationRecord::parse_line(line, line_no, layout))
            .collect()
    }

    /// Intervals of one tier, in input order
    ///
    /// The tier name is matched exactly. Rows missing start, end or label are
    /// dropped. An empty result means the tier is absent or unusable.
    pub fn tier_intervals(records: &[AnnotationRecord], tier: &str) -> Vec<Interval> {
        records
            .iter()
            .filter(|r| r.tier == tier)
            .filter_map(AnnotationRecord::to_interval)
            .collect()
    }

    /// Parse an export and extract one tier
    ///
    /// Returns [`BinarizeError::MissingTier`] when no usable interval remains,
    /// which callers treat as "skip this input".
    pub fn load_intervals(
        text: &str,
        tier: &str,
        layout: ColumnLayout,
    ) -> Result<Vec<Interval>, BinarizeError> {
        let records = Self::parse_records(text, layout)?;
        let intervals = Self::tier_intervals(&records, tier);
        if intervals.is_empty() {
            return Err(BinarizeError::MissingTier {
                tier: tier.to_string(),
            });
        }
        Ok(intervals)
    }
}
