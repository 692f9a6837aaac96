//! Channel merging
//!
//! Combines two binary series of the same subject (e.g. right and left arm
//! codings) into one series with an OR rule and a provenance tag per bin.

use crate::types::{BinarySeries, MergedRow, MergedSeries, Provenance};
use std::collections::HashMap;

/// Default short name of the primary channel
pub const DEFAULT_PRIMARY_CHANNEL: &str = "RA";

/// Default short name of the secondary channel
pub const DEFAULT_SECONDARY_CHANNEL: &str = "LA";

/// OR-merger of two named channels
#[derive(Debug, Clone)]
pub struct ChannelMerger {
    primary: String,
    secondary: String,
}

impl Default for ChannelMerger {
    fn default() -> Self {
        Self::new(DEFAULT_PRIMARY_CHANNEL, DEFAULT_SECONDARY_CHANNEL)
    }
}

impl ChannelMerger {
    pub fn new(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: secondary.into(),
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    pub fn secondary(&self) -> &str {
        &self.secondary
    }

    /// Merge over the full outer union of both grids
    ///
    /// A bin missing from one channel counts as 0 on that side. Rows are
    /// sorted by `(time_ms, center_ms)` with a stable sort, so duplicate keys
    /// keep their relative input order.
    pub fn merge(&self, primary: &BinarySeries, secondary: &BinarySeries) -> MergedSeries {
        let mut secondary_by_key: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
        for (idx, row) in secondary.iter().enumerate() {
            secondary_by_key.entry(row.key()).or_default().push(idx);
        }

        let mut matched = vec![false; secondary.len()];
        let mut pairs: Vec<((i64, i64), bool, bool)> = Vec::with_capacity(primary.len());

        for row in primary.iter() {
            match secondary_by_key.get(&row.key()) {
                Some(indices) => {
                    for &idx in indices {
                        matched[idx] = true;
                        pairs.push((row.key(), row.is_active(), secondary.rows[idx].is_active()));
                    }
                }
                None => pairs.push((row.key(), row.is_active(), false)),
            }
        }

        pairs.extend(
            secondary
                .iter()
                .zip(&matched)
                .filter(|(_, seen)| !**seen)
                .map(|(row, _)| (row.key(), false, row.is_active())),
        );

        pairs.sort_by_key(|(key, _, _)| *key);

        let rows = pairs
            .into_iter()
            .map(|((time_ms, center_ms), p, s)| MergedRow {
                tier: Provenance::classify(p, s, &self.primary, &self.secondary),
                time_ms,
                center_ms,
                binary_value: u8::from(p || s),
            })
            .collect();

        MergedSeries::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BinaryRow;
    use pretty_assertions::assert_eq;

    fn series(rows: &[(i64, i64, bool)]) -> BinarySeries {
        BinarySeries::new(
            rows.iter()
                .map(|&(t, c, v)| BinaryRow::new(t, c, v))
                .collect(),
        )
    }

    #[test]
    fn test_or_with_provenance() {
        let ra = series(&[(0, 50, true), (100, 150, false), (200, 250, true), (300, 350, false)]);
        let la = series(&[(0, 50, true), (100, 150, true), (200, 250, false), (300, 350, false)]);
        let merged = ChannelMerger::default().merge(&ra, &la);

        let tiers: Vec<String> = merged.iter().map(|r| r.tier.to_string()).collect();
        assert_eq!(tiers, vec!["Both", "LA", "RA", "None"]);
        assert_eq!(merged.values(), vec![1, 1, 1, 0]);
    }

    #[test]
    fn test_missing_key_defaults_to_zero() {
        let ra = series(&[(900, 950, false), (1000, 1050, true)]);
        let la = series(&[(900, 950, false)]);
        let merged = ChannelMerger::default().merge(&ra, &la);

        assert_eq!(merged.len(), 2);
        assert_eq!(
            merged.rows[1],
            MergedRow {
                tier: Provenance::Channel("RA".to_string()),
                time_ms: 1000,
                center_ms: 1050,
                binary_value: 1,
            }
        );
    }

    #[test]
    fn test_outer_union_is_sorted() {
        let ra = series(&[(0, 50, false), (100, 150, true)]);
        let la = series(&[(0, 50, false), (100, 150, false), (200, 250, true), (300, 350, false)]);
        let merged = ChannelMerger::default().merge(&ra, &la);

        let keys: Vec<(i64, i64)> = merged.iter().map(MergedRow::key).collect();
        assert_eq!(keys, vec![(0, 50), (100, 150), (200, 250), (300, 350)]);
        assert_eq!(merged.rows[2].tier, Provenance::Channel("LA".to_string()));
    }

    #[test]
    fn test_value_column_is_commutative() {
        let a = series(&[(0, 50, true), (100, 150, false), (200, 250, false)]);
        let b = series(&[(100, 150, true), (200, 250, false), (300, 350, true)]);
        let merger = ChannelMerger::default();

        let ab = merger.merge(&a, &b);
        let ba = merger.merge(&b, &a);
        assert_eq!(ab.values(), ba.values());
        assert_eq!(ab.rows[0].tier, Provenance::Channel("RA".to_string()));
        assert_eq!(ba.rows[0].tier, Provenance::Channel("LA".to_string()));
    }

    #[test]
    fn test_duplicate_keys_are_kept() {
        let ra = series(&[(0, 50, true)]);
        let la = series(&[(0, 50, false), (0, 50, true)]);
        let merged = ChannelMerger::new("R1", "L1").merge(&ra, &la);

        let tiers: Vec<&str> = merged.iter().map(|r| r.tier.as_str()).collect();
        assert_eq!(tiers, vec!["R1", "Both"]);
    }

    #[test]
    fn test_empty_inputs() {
        let merged = ChannelMerger::default().merge(&BinarySeries::default(), &BinarySeries::default());
        assert!(merged.is_empty());
    }
}
