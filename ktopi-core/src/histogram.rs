//! Weighted 1-D histogram with per-bin variance.
//!
//! Bins are uniform over `[x_min, x_max)`. Each bin keeps the sum of
//! weights and the sum of squared weights, so the statistical error of a
//! bin is `sqrt(sumw2)`. Values outside the axis are not stored (there are
//! no under/overflow bins); callers fold overflow into the last bin
//! themselves when that is wanted.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A 1-D histogram of weighted fills.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram1D {
    name: String,
    title: String,
    x_label: String,
    y_label: String,
    n_bins: usize,
    x_min: f64,
    x_max: f64,
    contents: Vec<f64>,
    sumw2: Vec<f64>,
    entries: u64,
}

impl Histogram1D {
    /// Books an empty histogram.
    ///
    /// # Errors
    /// Returns [`Error::InvalidBinning`] if `n_bins` is zero or the range is
    /// empty or not finite.
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        n_bins: usize,
        x_min: f64,
        x_max: f64,
    ) -> Result<Self> {
        if n_bins == 0 || !x_min.is_finite() || !x_max.is_finite() || x_max <= x_min {
            return Err(Error::InvalidBinning {
                n_bins,
                x_min,
                x_max,
            });
        }
        Ok(Self {
            name: name.into(),
            title: title.into(),
            x_label: String::new(),
            y_label: String::new(),
            n_bins,
            x_min,
            x_max,
            contents: vec![0.0; n_bins],
            sumw2: vec![0.0; n_bins],
            entries: 0,
        })
    }

    /// Sets the axis labels.
    #[must_use]
    pub fn with_labels(mut self, x_label: impl Into<String>, y_label: impl Into<String>) -> Self {
        self.x_label = x_label.into();
        self.y_label = y_label.into();
        self
    }

    /// Returns a zeroed copy with the same axis under a new name and title.
    #[must_use]
    pub fn clone_empty(&self, name: impl Into<String>, title: impl Into<String>) -> Self {
        let mut copy = self.clone_as(name, title);
        copy.reset();
        copy
    }

    /// Returns a full copy under a new name and title.
    #[must_use]
    pub fn clone_as(&self, name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    #[must_use]
    pub fn x_label(&self) -> &str {
        &self.x_label
    }

    #[must_use]
    pub fn y_label(&self) -> &str {
        &self.y_label
    }

    pub fn set_y_label(&mut self, y_label: impl Into<String>) {
        self.y_label = y_label.into();
    }

    #[must_use]
    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    #[must_use]
    pub fn x_min(&self) -> f64 {
        self.x_min
    }

    #[must_use]
    pub fn x_max(&self) -> f64 {
        self.x_max
    }

    /// Number of `fill` calls, including out-of-range ones.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Overrides the entry count, e.g. when restoring a stored histogram.
    pub fn set_entries(&mut self, entries: u64) {
        self.entries = entries;
    }

    /// Width of every bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        (self.x_max - self.x_min) / self.n_bins as f64
    }

    /// Index of the bin containing `x`, or `None` outside the axis.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn find_bin(&self, x: f64) -> Option<usize> {
        if !(x >= self.x_min && x < self.x_max) {
            return None;
        }
        let bin = ((x - self.x_min) / self.bin_width()) as usize;
        Some(bin.min(self.n_bins - 1))
    }

    /// Center of `bin`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_center(&self, bin: usize) -> f64 {
        self.x_min + (bin as f64 + 0.5) * self.bin_width()
    }

    /// All `n_bins + 1` bin edges.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_edges(&self) -> Vec<f64> {
        let width = self.bin_width();
        (0..=self.n_bins)
            .map(|i| self.x_min + i as f64 * width)
            .collect()
    }

    /// Adds `weight` to the bin containing `x`.
    pub fn fill(&mut self, x: f64, weight: f64) {
        self.entries += 1;
        if let Some(bin) = self.find_bin(x) {
            self.contents[bin] += weight;
            self.sumw2[bin] += weight * weight;
        }
    }

    /// Sum of weights in `bin`; 0 for bins past the axis.
    #[must_use]
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// Statistical error of `bin`, `sqrt(sumw2)`; 0 for bins past the axis.
    #[must_use]
    pub fn bin_error(&self, bin: usize) -> f64 {
        self.sumw2.get(bin).map_or(0.0, |w2| w2.sqrt())
    }

    /// Content of the bin containing `x`.
    #[must_use]
    pub fn content_at(&self, x: f64) -> Option<f64> {
        self.find_bin(x).map(|bin| self.contents[bin])
    }

    /// Overwrites the content of `bin`.
    ///
    /// # Errors
    /// Returns [`Error::BinOutOfRange`] if `bin >= n_bins`.
    pub fn set_bin_content(&mut self, bin: usize, value: f64) -> Result<()> {
        let n_bins = self.n_bins;
        let slot = self
            .contents
            .get_mut(bin)
            .ok_or(Error::BinOutOfRange { bin, n_bins })?;
        *slot = value;
        Ok(())
    }

    /// Overwrites the error of `bin`; the variance becomes `error²`.
    ///
    /// # Errors
    /// Returns [`Error::BinOutOfRange`] if `bin >= n_bins`.
    pub fn set_bin_error(&mut self, bin: usize, error: f64) -> Result<()> {
        let n_bins = self.n_bins;
        let slot = self
            .sumw2
            .get_mut(bin)
            .ok_or(Error::BinOutOfRange { bin, n_bins })?;
        *slot = error * error;
        Ok(())
    }

    /// Per-bin sums of weights.
    #[must_use]
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Per-bin sums of squared weights.
    #[must_use]
    pub fn sumw2(&self) -> &[f64] {
        &self.sumw2
    }

    /// Per-bin statistical errors.
    #[must_use]
    pub fn errors(&self) -> Vec<f64> {
        self.sumw2.iter().map(|w2| w2.sqrt()).collect()
    }

    /// Sum of all bin contents.
    #[must_use]
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }

    /// Returns true if every bin content and variance is zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.contents.iter().chain(&self.sumw2).all(|&v| v == 0.0)
    }

    /// Clears contents, variances and the entry count.
    pub fn reset(&mut self) {
        self.contents.fill(0.0);
        self.sumw2.fill(0.0);
        self.entries = 0;
    }

    /// Returns true if `other` has the same axis.
    #[must_use]
    pub fn is_compatible(&self, other: &Self) -> bool {
        self.n_bins == other.n_bins
            && (self.x_min - other.x_min).abs() <= f64::EPSILON * self.x_min.abs().max(1.0)
            && (self.x_max - other.x_max).abs() <= f64::EPSILON * self.x_max.abs().max(1.0)
    }

    fn check_compatible(&self, other: &Self) -> Result<()> {
        if self.is_compatible(other) {
            Ok(())
        } else {
            Err(Error::IncompatibleHistograms {
                left: self.name.clone(),
                right: other.name.clone(),
            })
        }
    }

    /// Divides this histogram bin-wise by `denominator`.
    ///
    /// Relative errors are added in quadrature. A bin whose denominator
    /// content is zero gets content 0 and error 0.
    ///
    /// # Errors
    /// Returns [`Error::IncompatibleHistograms`] if the axes differ.
    pub fn divide(&mut self, denominator: &Self) -> Result<()> {
        self.check_compatible(denominator)?;
        for bin in 0..self.n_bins {
            let c0 = self.contents[bin];
            let c1 = denominator.contents[bin];
            if c1 == 0.0 {
                self.contents[bin] = 0.0;
                self.sumw2[bin] = 0.0;
                continue;
            }
            let c1sq = c1 * c1;
            self.contents[bin] = c0 / c1;
            self.sumw2[bin] =
                (self.sumw2[bin] * c1sq + denominator.sumw2[bin] * c0 * c0) / (c1sq * c1sq);
        }
        Ok(())
    }

    /// Adds `other` bin-wise (sums, variances and entries).
    ///
    /// Merging is commutative and associative, so per-shard accumulators
    /// can be combined in any order.
    ///
    /// # Errors
    /// Returns [`Error::IncompatibleHistograms`] if the axes differ.
    pub fn merge(&mut self, other: &Self) -> Result<()> {
        self.check_compatible(other)?;
        for (dst, src) in self.contents.iter_mut().zip(&other.contents) {
            *dst += src;
        }
        for (dst, src) in self.sumw2.iter_mut().zip(&other.sumw2) {
            *dst += src;
        }
        self.entries += other.entries;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_bins(name: &str) -> Histogram1D {
        Histogram1D::new(name, name, 11, -0.5, 10.5).unwrap()
    }

    #[test]
    fn test_invalid_binning() {
        assert!(Histogram1D::new("h", "", 0, 0.0, 1.0).is_err());
        assert!(Histogram1D::new("h", "", 4, 1.0, 1.0).is_err());
        assert!(Histogram1D::new("h", "", 4, 0.0, f64::NAN).is_err());
    }

    #[test]
    fn test_find_bin_edges() {
        let h = unit_bins("h");
        assert_eq!(h.find_bin(-0.5), Some(0));
        assert_eq!(h.find_bin(0.0), Some(0));
        assert_eq!(h.find_bin(5.0), Some(5));
        assert_eq!(h.find_bin(10.0), Some(10));
        assert_eq!(h.find_bin(10.5), None);
        assert_eq!(h.find_bin(-0.6), None);
        assert_eq!(h.find_bin(f64::NAN), None);
    }

    #[test]
    fn test_content_at() {
        let mut h = unit_bins("h");
        h.fill(3.0, 2.0);
        h.fill(3.4, 1.0);
        assert_eq!(h.content_at(3.0), Some(3.0));
        assert_eq!(h.content_at(4.0), Some(0.0));
        assert_eq!(h.content_at(11.0), None);
    }

    #[test]
    fn test_weighted_fill_variance() {
        let mut h = unit_bins("h");
        h.fill(3.0, 2.0);
        h.fill(3.0, 3.0);
        h.fill(42.0, 1.0);

        assert_relative_eq!(h.bin_content(3), 5.0);
        assert_relative_eq!(h.sumw2()[3], 13.0);
        assert_relative_eq!(h.bin_error(3), 13.0_f64.sqrt());
        assert_eq!(h.entries(), 3);
        assert_relative_eq!(h.integral(), 5.0);
    }

    #[test]
    fn test_set_bin_error_stores_variance() {
        let mut h = unit_bins("h");
        h.set_bin_content(2, 4.0).unwrap();
        h.set_bin_error(2, 0.5).unwrap();
        assert_relative_eq!(h.sumw2()[2], 0.25);
        assert!(h.set_bin_content(11, 1.0).is_err());
        assert_relative_eq!(h.bin_content(99), 0.0);
    }

    #[test]
    fn test_divide_propagates_relative_errors() {
        let mut k = unit_bins("k");
        let mut pi = unit_bins("pi");
        k.fill(5.0, 2.0);
        pi.fill(5.0, 3.0);

        let mut ratio = k.clone_as("ratio", "");
        ratio.divide(&pi).unwrap();

        assert_relative_eq!(ratio.bin_content(5), 2.0 / 3.0);
        // (e0²c1² + e1²c0²) / c1⁴ with e0² = 4, e1² = 9
        let expected = (4.0 * 9.0 + 9.0 * 4.0) / 81.0;
        assert_relative_eq!(ratio.sumw2()[5], expected);
    }

    #[test]
    fn test_divide_by_empty_bin_is_zero() {
        let mut k = unit_bins("k");
        let pi = unit_bins("pi");
        k.fill(1.0, 4.0);
        k.divide(&pi).unwrap();
        assert_relative_eq!(k.bin_content(1), 0.0);
        assert_relative_eq!(k.bin_error(1), 0.0);
        assert!(k.is_zero());
    }

    #[test]
    fn test_incompatible_axes() {
        let mut a = unit_bins("a");
        let b = Histogram1D::new("b", "", 4, -0.5, 10.5).unwrap();
        assert!(matches!(
            a.divide(&b),
            Err(Error::IncompatibleHistograms { .. })
        ));
        assert!(a.merge(&b).is_err());
    }

    #[test]
    fn test_merge_order_independent() {
        let mut shards: Vec<Histogram1D> = (0..3).map(|i| unit_bins(&format!("s{i}"))).collect();
        shards[0].fill(1.0, 1.0);
        shards[1].fill(1.0, 2.0);
        shards[1].fill(4.0, 0.5);
        shards[2].fill(9.0, 3.0);

        let mut forward = unit_bins("fwd");
        for shard in &shards {
            forward.merge(shard).unwrap();
        }
        let mut backward = unit_bins("bwd");
        for shard in shards.iter().rev() {
            backward.merge(shard).unwrap();
        }

        assert_eq!(forward.contents(), backward.contents());
        assert_eq!(forward.sumw2(), backward.sumw2());
        assert_eq!(forward.entries(), 4);
        assert_relative_eq!(forward.sumw2()[1], 5.0);
    }

    #[test]
    fn test_clone_empty_keeps_axis() {
        let mut h = unit_bins("h").with_labels("N", "Yield");
        h.fill(2.0, 1.0);
        let empty = h.clone_empty("e", "Empty");
        assert!(empty.is_zero());
        assert!(empty.is_compatible(&h));
        assert_eq!(empty.x_label(), "N");
        assert_eq!(empty.name(), "e");
        assert_eq!(h.bin_edges().len(), 12);
        assert_relative_eq!(h.bin_center(0), 0.0);
    }
}
