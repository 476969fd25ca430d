//! Column-frequency histogram.
//!
//! Counts where cells start horizontally across a document. The implied
//! boundaries are reported for diagnostics only; reconstruction never
//! filters cells by them.

use std::collections::BTreeMap;

/// Histogram of cell start positions, normalized per page.
#[derive(Debug, Clone, Default)]
pub struct ColumnHistogram {
    counts: BTreeMap<i64, usize>,
    page_count: u32,
}

impl ColumnHistogram {
    /// Create an empty histogram for a document with `page_count` pages.
    pub fn new(page_count: u32) -> Self {
        Self {
            counts: BTreeMap::new(),
            page_count,
        }
    }

    /// Build a histogram from cell start positions.
    pub fn from_positions(positions: impl IntoIterator<Item = f64>, page_count: u32) -> Self {
        let mut histogram = Self::new(page_count);
        for x in positions {
            histogram.record(x);
        }
        histogram
    }

    /// Record one cell starting at `x` (bucketed to whole units).
    pub fn record(&mut self, x: f64) {
        *self.counts.entry(x.round() as i64).or_insert(0) += 1;
    }

    /// Number of distinct start positions.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Check whether nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Average number of cells per page starting at `x`.
    pub fn frequency(&self, x: f64) -> f64 {
        let count = self.counts.get(&(x.round() as i64)).copied().unwrap_or(0);
        count as f64 / self.page_count.max(1) as f64
    }

    /// Start positions whose per-page frequency reaches `min_frequency`,
    /// left to right.
    pub fn boundaries(&self, min_frequency: f64) -> Vec<f64> {
        let pages = self.page_count.max(1) as f64;
        self.counts
            .iter()
            .filter(|&(_, &count)| count as f64 / pages >= min_frequency)
            .map(|(&x, _)| x as f64)
            .collect()
    }
}
