//! Uniform time grid
//!
//! A grid is the sequence of bin boundaries `0, W, 2W, ...` whose bins cover
//! `[0, max_end)`. Each bin is sampled at its center, `boundary + W/2`.

use crate::error::BinarizeError;
use crate::types::Interval;

/// Default bin width (100 ms)
pub const DEFAULT_BIN_WIDTH_MS: i64 = 100;

/// Upper bound on the bins of one grid (about 23 days at 100 ms)
pub const MAX_GRID_BINS: usize = 20_000_000;

/// Uniform grid of `len` bins of width `bin_width_ms`, starting at 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    bin_width_ms: i64,
    len: usize,
}

impl TimeGrid {
    /// Grid covering `[0, end_ms)`, rounded up to a whole number of bins
    ///
    /// Fails with `InvalidInterval` when the grid would exceed
    /// [`MAX_GRID_BINS`] or its boundaries would not fit in an `i64`.
    pub fn covering(end_ms: f64, bin_width_ms: i64) -> Result<Self, BinarizeError> {
        if bin_width_ms <= 0 {
            return Err(BinarizeError::InvalidConfig(format!(
                "bin width must be positive, got {}",
                bin_width_ms
            )));
        }
        let bins = if end_ms > 0.0 {
            (end_ms / bin_width_ms as f64).ceil()
        } else {
            0.0
        };
        if bins > MAX_GRID_BINS as f64 {
            return Err(BinarizeError::InvalidInterval {
                reason: format!(
                    "end time {} ms needs {} bins of {} ms, limit is {}",
                    end_ms, bins, bin_width_ms, MAX_GRID_BINS
                ),
            });
        }
        let len = bins as usize;

        // Last center is end - W + W/2, so checking the end boundary suffices
        (len as i64)
            .checked_mul(bin_width_ms)
            .ok_or_else(|| BinarizeError::InvalidInterval {
                reason: format!("{} bins of {} ms overflow the time axis", len, bin_width_ms),
            })?;
        Ok(Self { bin_width_ms, len })
    }

    /// Grid covering the latest end time of `intervals`
    pub fn for_intervals(intervals: &[Interval], bin_width_ms: i64) -> Result<Self, BinarizeError> {
        let max_end = intervals
            .iter()
            .map(|i| i.end_ms)
            .fold(f64::NEG_INFINITY, f64::max);
        Self::covering(max_end, bin_width_ms)
    }

    pub fn bin_width_ms(&self) -> i64 {
        self.bin_width_ms
    }

    /// Number of bins
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Upper boundary of the last bin
    pub fn end_ms(&self) -> i64 {
        self.time_ms(self.len)
    }

    /// Left boundary of bin `index`
    ///
    /// Saturates past the end of the time axis; in-grid indices never do.
    pub fn time_ms(&self, index: usize) -> i64 {
        i64::try_from(index)
            .ok()
            .and_then(|i| i.checked_mul(self.bin_width_ms))
            .unwrap_or(i64::MAX)
    }

    /// Sampling point of bin `index`
    pub fn center_ms(&self, index: usize) -> i64 {
        self.time_ms(index).saturating_add(self.bin_width_ms / 2)
    }

    /// `(time_ms, center_ms)` of every bin, ascending
    pub fn bins(&self) -> impl Iterator<Item = (i64, i64)> + '_ {
        (0..self.len).map(move |i| (self.time_ms(i), self.center_ms(i)))
    }

    /// Indices of the bins whose center falls inside `interval`
    pub fn bins_within(&self, interval: &Interval) -> std::ops::Range<usize> {
        let w = self.bin_width_ms as f64;
        let half = (self.bin_width_ms / 2) as f64;
        // Smallest i with i*W + W/2 >= start, and smallest i with i*W + W/2 >= end
        let lo = ((interval.start_ms - half) / w).ceil().max(0.0) as usize;
        let hi = ((interval.end_ms - half) / w).ceil().max(0.0) as usize;
        let lo = lo.min(self.len);
        let hi = hi.min(self.len);
        lo..hi.max(lo)
    }
}
