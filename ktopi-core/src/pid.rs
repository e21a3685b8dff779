//! Particle identification: species, calibration averaging and the 2×2
//! kaon/pion response matrix.
//!
//! The response matrix relates true to tagged yields:
//!
//! ```text
//! [ N(tag K)  ]   [ eKAsK   ePiAsK  ] [ N_true(K)  ]
//! [ N(tag pi) ] = [ eKAsPi  ePiAsPi ] [ N_true(pi) ]
//! ```
//!
//! and is inverted in closed form to unmix tagged yields per bin.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::histogram::Histogram1D;
use crate::Result;

/// Determinant magnitude below which the response matrix is treated as singular.
pub const SINGULAR_DETERMINANT: f64 = 1.0e-8;

/// Minimum categorical score for a track to count as tagged.
pub const TAG_THRESHOLD: i64 = 2;

/// Hadron species with identification scores and calibration values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Species {
    Kaon,
    Pion,
    Proton,
}

impl Species {
    /// Row/column index in the 3×3 calibration layout.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Species::Kaon => 0,
            Species::Pion => 1,
            Species::Proton => 2,
        }
    }

    /// PDG code of the positive particle.
    #[must_use]
    pub const fn pdg_code(self) -> i64 {
        match self {
            Species::Kaon => 321,
            Species::Pion => 211,
            Species::Proton => 2212,
        }
    }

    /// Returns true if `pdg_id` is this species, either charge.
    #[must_use]
    pub fn matches_pdg(self, pdg_id: i64) -> bool {
        pdg_id.unsigned_abs() == self.pdg_code().unsigned_abs()
    }

    /// Returns true if `score` passes the tagging threshold.
    #[must_use]
    pub const fn is_tagged(score: i64) -> bool {
        score >= TAG_THRESHOLD
    }
}

/// Running sums of the kaon/pion calibration values over charged tracks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationAccumulator {
    k_as_k: f64,
    k_as_pi: f64,
    pi_as_k: f64,
    pi_as_pi: f64,
    tracks: u64,
}

impl CalibrationAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one track's calibration values.
    pub fn add(&mut self, k_as_k: f64, k_as_pi: f64, pi_as_k: f64, pi_as_pi: f64) {
        self.k_as_k += k_as_k;
        self.k_as_pi += k_as_pi;
        self.pi_as_k += pi_as_k;
        self.pi_as_pi += pi_as_pi;
        self.tracks += 1;
    }

    /// Number of tracks accumulated.
    #[must_use]
    pub fn tracks(&self) -> u64 {
        self.tracks
    }

    /// Averages the sums into a response matrix, or `None` with no tracks.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average(&self) -> Option<ResponseMatrix> {
        if self.tracks == 0 {
            return None;
        }
        let n = self.tracks as f64;
        Some(ResponseMatrix {
            k_as_k: self.k_as_k / n,
            k_as_pi: self.k_as_pi / n,
            pi_as_k: self.pi_as_k / n,
            pi_as_pi: self.pi_as_pi / n,
        })
    }

    /// Adds another accumulator's sums.
    pub fn merge(&mut self, other: &Self) {
        self.k_as_k += other.k_as_k;
        self.k_as_pi += other.k_as_pi;
        self.pi_as_k += other.pi_as_k;
        self.pi_as_pi += other.pi_as_pi;
        self.tracks += other.tracks;
    }
}

/// 2×2 kaon/pion response matrix, `tagged = E · true`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ResponseMatrix {
    /// True kaon tagged as kaon.
    pub k_as_k: f64,
    /// True kaon tagged as pion.
    pub k_as_pi: f64,
    /// True pion tagged as kaon.
    pub pi_as_k: f64,
    /// True pion tagged as pion.
    pub pi_as_pi: f64,
}

impl ResponseMatrix {
    #[must_use]
    pub fn determinant(&self) -> f64 {
        self.k_as_k * self.pi_as_pi - self.pi_as_k * self.k_as_pi
    }

    /// Returns true if `|det| < 1e-8`.
    #[must_use]
    pub fn is_singular(&self) -> bool {
        self.determinant().abs() < SINGULAR_DETERMINANT
    }

    /// Forward model: tagged `(K, pi)` yields from true ones.
    #[must_use]
    pub fn apply(&self, true_k: f64, true_pi: f64) -> (f64, f64) {
        (
            self.k_as_k * true_k + self.pi_as_k * true_pi,
            self.k_as_pi * true_k + self.pi_as_pi * true_pi,
        )
    }

    /// Inverts the forward model without flooring.
    ///
    /// Returns `None` for a singular matrix.
    #[must_use]
    pub fn solve(&self, tagged_k: f64, tagged_pi: f64) -> Option<(f64, f64)> {
        if self.is_singular() {
            return None;
        }
        let det = self.determinant();
        Some((
            (self.pi_as_pi * tagged_k - self.pi_as_k * tagged_pi) / det,
            (-self.k_as_pi * tagged_k + self.k_as_k * tagged_pi) / det,
        ))
    }

    /// Recovers true `(K, pi)` yields from tagged ones, flooring negatives at 0.
    #[must_use]
    pub fn unmix(&self, tagged_k: f64, tagged_pi: f64) -> Option<(f64, f64)> {
        self.solve(tagged_k, tagged_pi)
            .map(|(k, pi)| (k.max(0.0), pi.max(0.0)))
    }

    /// Propagates independent tagged errors through the inverse, in quadrature.
    #[must_use]
    pub fn unmix_errors(&self, err_k: f64, err_pi: f64) -> Option<(f64, f64)> {
        if self.is_singular() {
            return None;
        }
        let det = self.determinant();
        let err_true_k = (self.pi_as_pi * err_k / det).hypot(self.pi_as_k * err_pi / det);
        let err_true_pi = (self.k_as_pi * err_k / det).hypot(self.k_as_k * err_pi / det);
        Some((err_true_k, err_true_pi))
    }

    /// Unmixes tagged kaon/pion histograms bin by bin into `out_k`/`out_pi`.
    ///
    /// Returns `Ok(false)` without touching the outputs if the matrix is
    /// singular.
    ///
    /// # Errors
    /// Returns an error if the histograms do not share one axis.
    pub fn unmix_histograms(
        &self,
        tagged_k: &Histogram1D,
        tagged_pi: &Histogram1D,
        out_k: &mut Histogram1D,
        out_pi: &mut Histogram1D,
    ) -> Result<bool> {
        for other in [tagged_pi, &*out_k, &*out_pi] {
            if !tagged_k.is_compatible(other) {
                return Err(crate::Error::IncompatibleHistograms {
                    left: tagged_k.name().to_string(),
                    right: other.name().to_string(),
                });
            }
        }
        if self.is_singular() {
            return Ok(false);
        }

        for bin in 0..tagged_k.n_bins() {
            let (k, pi) = self
                .unmix(tagged_k.bin_content(bin), tagged_pi.bin_content(bin))
                .unwrap_or_default();
            let (err_k, err_pi) = self
                .unmix_errors(tagged_k.bin_error(bin), tagged_pi.bin_error(bin))
                .unwrap_or_default();
            out_k.set_bin_content(bin, k)?;
            out_pi.set_bin_content(bin, pi)?;
            out_k.set_bin_error(bin, err_k)?;
            out_pi.set_bin_error(bin, err_pi)?;
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn typical() -> ResponseMatrix {
        ResponseMatrix {
            k_as_k: 0.85,
            k_as_pi: 0.10,
            pi_as_k: 0.04,
            pi_as_pi: 0.92,
        }
    }

    #[test]
    fn test_species_pdg() {
        assert!(Species::Kaon.matches_pdg(321));
        assert!(Species::Kaon.matches_pdg(-321));
        assert!(!Species::Kaon.matches_pdg(211));
        assert!(Species::Pion.matches_pdg(-211));
        assert!(Species::is_tagged(2));
        assert!(!Species::is_tagged(1));
    }

    #[test]
    fn test_forward_then_solve_round_trip() {
        let e = typical();
        for (k, p) in [(12.0, 140.0), (0.0, 3.0), (7.5, 0.0), (1.0e4, 2.5e5)] {
            let (tk, tp) = e.apply(k, p);
            let (rk, rp) = e.solve(tk, tp).unwrap();
            assert_relative_eq!(rk, k, epsilon = 1e-9, max_relative = 1e-12);
            assert_relative_eq!(rp, p, epsilon = 1e-9, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_unmix_floors_negative_yields() {
        let e = typical();
        // Far more tagged kaons than the pion fake rate allows: true pions < 0.
        let (k, pi) = e.unmix(100.0, 1.0).unwrap();
        assert!(k > 0.0);
        assert_relative_eq!(pi, 0.0);
    }

    #[test]
    fn test_singular_matrix() {
        let e = ResponseMatrix {
            k_as_k: 0.5,
            k_as_pi: 0.5,
            pi_as_k: 0.5,
            pi_as_pi: 0.5,
        };
        assert!(e.is_singular());
        assert!(e.solve(1.0, 1.0).is_none());
        assert!(e.unmix_errors(1.0, 1.0).is_none());
    }

    #[test]
    fn test_identity_errors_pass_through() {
        let e = ResponseMatrix {
            k_as_k: 1.0,
            k_as_pi: 0.0,
            pi_as_k: 0.0,
            pi_as_pi: 1.0,
        };
        let (ek, ep) = e.unmix_errors(0.3, 0.4).unwrap();
        assert_relative_eq!(ek, 0.3);
        assert_relative_eq!(ep, 0.4);
    }

    #[test]
    fn test_calibration_average() {
        let mut acc = CalibrationAccumulator::new();
        assert!(acc.average().is_none());
        acc.add(0.8, 0.1, 0.05, 0.9);
        acc.add(0.9, 0.2, 0.15, 0.7);
        let e = acc.average().unwrap();
        assert_eq!(acc.tracks(), 2);
        assert_relative_eq!(e.k_as_k, 0.85);
        assert_relative_eq!(e.k_as_pi, 0.15);
        assert_relative_eq!(e.pi_as_k, 0.10);
        assert_relative_eq!(e.pi_as_pi, 0.80);
    }

    #[test]
    fn test_calibration_merge_matches_single_pass() {
        let tracks = [
            (0.8, 0.1, 0.05, 0.9),
            (0.9, 0.2, 0.15, 0.7),
            (0.7, 0.3, 0.10, 0.8),
        ];
        let mut whole = CalibrationAccumulator::new();
        for &(a, b, c, d) in &tracks {
            whole.add(a, b, c, d);
        }

        let mut first = CalibrationAccumulator::new();
        let mut second = CalibrationAccumulator::new();
        first.add(tracks[0].0, tracks[0].1, tracks[0].2, tracks[0].3);
        for &(a, b, c, d) in &tracks[1..] {
            second.add(a, b, c, d);
        }
        let mut forward = first.clone();
        forward.merge(&second);
        let mut backward = second;
        backward.merge(&first);

        assert_eq!(forward.tracks(), 3);
        assert_eq!(backward.tracks(), 3);
        let expected = whole.average().unwrap();
        for merged in [forward.average().unwrap(), backward.average().unwrap()] {
            assert_relative_eq!(merged.k_as_k, expected.k_as_k);
            assert_relative_eq!(merged.k_as_pi, expected.k_as_pi);
            assert_relative_eq!(merged.pi_as_k, expected.pi_as_k);
            assert_relative_eq!(merged.pi_as_pi, expected.pi_as_pi);
        }

        let mut empty = CalibrationAccumulator::new();
        empty.merge(&CalibrationAccumulator::new());
        assert!(empty.average().is_none());
    }

    #[test]
    fn test_unmix_histograms() {
        let e = typical();
        let mut hk = Histogram1D::new("hK", "", 3, -0.5, 2.5).unwrap();
        let mut hpi = hk.clone_as("hPi", "");
        let (tk, tp) = e.apply(10.0, 100.0);
        hk.fill(1.0, tk);
        hpi.fill(1.0, tp);

        let mut ck = hk.clone_empty("hKCorrected", "");
        let mut cpi = hk.clone_empty("hPiCorrected", "");
        assert!(e.unmix_histograms(&hk, &hpi, &mut ck, &mut cpi).unwrap());
        assert_relative_eq!(ck.bin_content(1), 10.0, max_relative = 1e-12);
        assert_relative_eq!(cpi.bin_content(1), 100.0, max_relative = 1e-12);
        assert!(ck.bin_error(1) > 0.0);
        assert_relative_eq!(ck.bin_content(0), 0.0);
    }
}
