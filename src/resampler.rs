//! Grid resampling of labeled intervals
//!
//! Maps irregular, possibly overlapping intervals onto a [`TimeGrid`] and emits
//! one binary value per bin. Resampling runs in two steps:
//! 1. Resolve the winning interval of each bin under an [`OverlapPolicy`]
//! 2. Apply the [`ActivationRule`] to the winner's label
//!
//! A bin with no containing interval is inactive.

use crate::error::BinarizeError;
use crate::grid::{TimeGrid, DEFAULT_BIN_WIDTH_MS};
use crate::schema::normalize_label;
use crate::types::{BinaryRow, BinarySeries, Interval};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Tie-break between intervals that contain the same bin center
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlapPolicy {
    /// The last containing interval in input order wins
    #[default]
    LastWins,
    /// The first containing interval in input order wins
    FirstWins,
}

impl OverlapPolicy {
    /// Index of the winning interval for every bin of `grid`
    pub fn resolve(&self, grid: &TimeGrid, intervals: &[Interval]) -> Vec<Option<usize>> {
        intervals
            .iter()
            .enumerate()
            .fold(vec![None; grid.len()], |mut winners, (idx, interval)| {
                for bin in grid.bins_within(interval) {
                    match self {
                        OverlapPolicy::LastWins => winners[bin] = Some(idx),
                        OverlapPolicy::FirstWins => {
                            winners[bin].get_or_insert(idx);
                        }
                    }
                }
                winners
            })
    }
}

/// Label set that marks a bin as active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationRule {
    labels: BTreeSet<String>,
}

impl ActivationRule {
    /// Active when the label equals `label`
    pub fn single(label: &str) -> Self {
        Self::any_of([label])
    }

    /// Active when the label equals any of `labels`
    pub fn any_of<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            labels: labels
                .into_iter()
                .map(|l| normalize_label(l.as_ref()))
                .filter(|l| !l.is_empty())
                .collect(),
        }
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn matches(&self, label: &str) -> bool {
        self.labels.contains(&normalize_label(label))
    }
}

/// Resampler from intervals to a binary series
#[derive(Debug, Clone)]
pub struct GridResampler {
    rule: ActivationRule,
    bin_width_ms: i64,
    policy: OverlapPolicy,
}

impl GridResampler {
    /// Resampler with the default 100 ms bins and last-wins overlap
    pub fn new(rule: ActivationRule) -> Self {
        Self {
            rule,
            bin_width_ms: DEFAULT_BIN_WIDTH_MS,
            policy: OverlapPolicy::default(),
        }
    }

    pub fn with_bin_width(mut self, bin_width_ms: i64) -> Self {
        self.bin_width_ms = bin_width_ms;
        self
    }

    pub fn with_policy(mut self, policy: OverlapPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn rule(&self) -> &ActivationRule {
        &self.rule
    }

    /// Resample `intervals` onto a grid covering their latest end time
    pub fn resample(&self, intervals: &[Interval]) -> Result<BinarySeries, BinarizeError> {
        let grid = TimeGrid::for_intervals(intervals, self.bin_width_ms)?;
        Ok(self.resample_on(&grid, intervals))
    }

    /// Resample `intervals` onto an existing grid
    pub fn resample_on(&self, grid: &TimeGrid, intervals: &[Interval]) -> BinarySeries {
        let winners = self.policy.resolve(grid, intervals);
        let rows = grid
            .bins()
            .zip(winners)
            .map(|((time_ms, center_ms), winner)| {
                let active = winner
                    .map(|idx| self.rule.matches(&intervals[idx].label))
                    .unwrap_or(false);
                BinaryRow::new(time_ms, center_ms, active)
            })
            .collect();
        BinarySeries::new(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row_at(series: &BinarySeries, center_ms: i64) -> BinaryRow {
        *series
            .iter()
            .find(|r| r.center_ms == center_ms)
            .expect("bin center present")
    }

    #[test]
    fn test_single_label_example() {
        let intervals = vec![
            Interval::new(0.0, 3720.0, "NP"),
            Interval::new(3720.0, 7210.0, "P"),
        ];
        let series = GridResampler::new(ActivationRule::single("P"))
            .resample(&intervals)
            .unwrap();

        assert_eq!(series.len(), 73);
        assert_eq!(row_at(&series, 3750), BinaryRow::new(3700, 3750, true));
        assert_eq!(row_at(&series, 3650), BinaryRow::new(3600, 3650, false));
        assert_eq!(row_at(&series, 7150).binary_value, 1);
        assert_eq!(row_at(&series, 7250).binary_value, 0);
    }

    #[test]
    fn test_multi_label_rule() {
        let intervals = vec![
            Interval::new(0.0, 200.0, "MDG"),
            Interval::new(200.0, 400.0, "X"),
            Interval::new(400.0, 600.0, "MDT"),
        ];
        let series = GridResampler::new(ActivationRule::any_of(["MDG", "MDT"]))
            .resample(&intervals)
            .unwrap();
        assert_eq!(series.values(), vec![1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn test_rule_normalizes_tokens() {
        let rule = ActivationRule::any_of([" mdg", "Mdt "]);
        assert!(rule.matches("MDG"));
        assert!(rule.matches(" mdt"));
        assert!(!rule.matches("P"));
        assert_eq!(rule.labels().collect::<Vec<_>>(), vec!["MDG", "MDT"]);
    }

    #[test]
    fn test_last_interval_wins_on_overlap() {
        let intervals = vec![
            Interval::new(0.0, 500.0, "P"),
            Interval::new(200.0, 300.0, "NP"),
        ];
        let series = GridResampler::new(ActivationRule::single("P"))
            .resample(&intervals)
            .unwrap();
        assert_eq!(series.values(), vec![1, 1, 0, 1, 1]);
    }

    #[test]
    fn test_first_wins_policy() {
        let intervals = vec![
            Interval::new(0.0, 500.0, "P"),
            Interval::new(200.0, 300.0, "NP"),
        ];
        let series = GridResampler::new(ActivationRule::single("P"))
            .with_policy(OverlapPolicy::FirstWins)
            .resample(&intervals)
            .unwrap();
        assert_eq!(series.values(), vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_winner_is_last_containing_interval() {
        let intervals = vec![
            Interval::new(0.0, 1000.0, "A"),
            Interval::new(120.0, 480.0, "B"),
            Interval::new(300.0, 900.0, "C"),
            Interval::new(5000.0, 6000.0, "D"),
        ];
        let grid = TimeGrid::for_intervals(&intervals, 100).unwrap();
        let winners = OverlapPolicy::LastWins.resolve(&grid, &intervals);
        for (bin, winner) in winners.iter().enumerate() {
            let center = grid.center_ms(bin);
            let expected = intervals.iter().rposition(|i| i.contains(center));
            assert_eq!(*winner, expected, "center {}", center);
        }
    }

    #[test]
    fn test_uncovered_bins_are_inactive() {
        let intervals = vec![Interval::new(1000.0, 1200.0, "P")];
        let series = GridResampler::new(ActivationRule::single("P"))
            .resample(&intervals)
            .unwrap();
        assert_eq!(series.len(), 12);
        assert_eq!(series.active_count(), 2);
        assert!(series.rows[..10].iter().all(|r| r.binary_value == 0));
    }

    #[test]
    fn test_resampling_is_idempotent() {
        let intervals = vec![
            Interval::new(0.0, 3720.0, "NP"),
            Interval::new(3720.0, 7210.0, "P"),
            Interval::new(7000.0, 9000.0, "P"),
        ];
        let resampler = GridResampler::new(ActivationRule::single("P"));
        assert_eq!(
            resampler.resample(&intervals).unwrap(),
            resampler.resample(&intervals).unwrap()
        );
    }

    #[test]
    fn test_custom_bin_width() {
        let intervals = vec![Interval::new(0.0, 1000.0, "P")];
        let series = GridResampler::new(ActivationRule::single("P"))
            .with_bin_width(250)
            .resample(&intervals)
            .unwrap();
        assert_eq!(series.len(), 4);
        assert_eq!(series.rows[1], BinaryRow::new(250, 375, true));
    }
}
