//! Fixed-width one-dimensional histogram.

use serde::{Deserialize, Serialize};

/// A 1-D histogram with `bins` equal-width bins over `[low, high)`.
///
/// Values below `low` land in the underflow, values at or above `high` in
/// the overflow. NaN values are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram {
    low: f64,
    high: f64,
    counts: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
    sum_w: f64,
    sum_wx: f64,
}

impl Histogram {
    /// Create an empty histogram. `bins` is clamped to at least one, and
    /// `high` is raised above `low` when the range is empty.
    pub fn new(bins: usize, low: f64, high: f64) -> Self {
        let high = if high > low { high } else { low + 1.0 };
        Self {
            low,
            high,
            counts: vec![0.0; bins.max(1)],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            sum_w: 0.0,
            sum_wx: 0.0,
        }
    }

    /// Fill with weight one.
    pub fn fill(&mut self, x: f64) {
        self.fill_weighted(x, 1.0);
    }

    pub fn fill_weighted(&mut self, x: f64, weight: f64) {
        if x.is_nan() {
            return;
        }
        self.entries += 1;
        match self.bin_index(x) {
            Some(bin) => {
                self.counts[bin] += weight;
                self.sum_w += weight;
                self.sum_wx += weight * x;
            }
            None if x < self.low => self.underflow += weight,
            None => self.overflow += weight,
        }
    }

    /// The in-range bin `x` falls into.
    pub fn bin_index(&self, x: f64) -> Option<usize> {
        if !(self.low..self.high).contains(&x) {
            return None;
        }
        let width = (self.high - self.low) / self.counts.len() as f64;
        let bin = ((x - self.low) / width) as usize;
        Some(bin.min(self.counts.len() - 1))
    }

    pub fn bins(&self) -> usize {
        self.counts.len()
    }

    pub fn range(&self) -> (f64, f64) {
        (self.low, self.high)
    }

    /// Weighted content of one bin. Zero for bins out of range.
    pub fn count(&self, bin: usize) -> f64 {
        self.counts.get(bin).copied().unwrap_or(0.0)
    }

    pub fn counts(&self) -> &[f64] {
        &self.counts
    }

    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Number of fills, including under/overflow.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Sum of in-range weights.
    pub fn integral(&self) -> f64 {
        self.sum_w
    }

    /// Weighted mean of in-range fills.
    pub fn mean(&self) -> Option<f64> {
        (self.sum_w != 0.0).then(|| self.sum_wx / self.sum_w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_bins() {
        let mut h = Histogram::new(4, 0.0, 4.0);
        for x in [0.0, 0.5, 1.0, 3.99, -1.0, 4.0, f64::NAN] {
            h.fill(x);
        }
        assert_eq!(h.counts(), &[2.0, 1.0, 0.0, 1.0]);
        assert_eq!(h.underflow(), 1.0);
        assert_eq!(h.overflow(), 1.0);
        assert_eq!(h.entries(), 6);
        assert_eq!(h.integral(), 4.0);
    }

    #[test]
    fn test_weighted_mean() {
        let mut h = Histogram::new(10, 0.0, 10.0);
        assert_eq!(h.mean(), None);
        h.fill_weighted(2.0, 1.0);
        h.fill_weighted(6.0, 3.0);
        assert_eq!(h.mean(), Some(5.0));
    }

    #[test]
    fn test_degenerate_parameters() {
        let h = Histogram::new(0, 2.0, 2.0);
        assert_eq!(h.bins(), 1);
        assert_eq!(h.range(), (2.0, 3.0));
        assert_eq!(h.count(7), 0.0);
    }
}
