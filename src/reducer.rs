//! Conjunction of a merged series with a reference series
//!
//! Keeps only bins present on both sides and marks them active when both
//! sides are active. Bins missing on either side are dropped, not zero-filled.

use crate::types::{BinaryRow, BinarySeries, MergedSeries};
use std::collections::HashMap;

/// Inner-join AND reducer
#[derive(Debug, Clone, Copy, Default)]
pub struct ConjunctionReducer;

impl ConjunctionReducer {
    /// Reduce a merged series against a reference series
    ///
    /// Output follows the reference series order; a key repeated on the merged
    /// side yields one row per match.
    pub fn reduce(merged: &MergedSeries, reference: &BinarySeries) -> BinarySeries {
        Self::reduce_binary(&merged.to_binary(), reference)
    }

    /// Inner join of two plain binary series with an AND rule
    pub fn reduce_binary(source: &BinarySeries, reference: &BinarySeries) -> BinarySeries {
        let mut source_by_key: HashMap<(i64, i64), Vec<bool>> = HashMap::new();
        for row in source.iter() {
            source_by_key.entry(row.key()).or_default().push(row.is_active());
        }

        let source_by_key = &source_by_key;
        let rows = reference
            .iter()
            .flat_map(move |row| {
                source_by_key
                    .get(&row.key())
                    .into_iter()
                    .flatten()
                    .map(move |&active| BinaryRow::new(row.time_ms, row.center_ms, row.is_active() && active))
            })
            .collect();

        BinarySeries::new(rows)
    }
}
