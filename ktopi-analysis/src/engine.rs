//! K/pi yield aggregation.
//!
//! The [`Analyzer`] consumes selected events one at a time, filling kaon
//! and pion yields against the tag multiplicity. In reco mode it also
//! averages the per-track calibration values into the 2×2 response matrix
//! used by [`Analyzer::finalize`] to unmix the tagged yields.

use crate::selection::{
    generator_counts, tag_multiplicity, tagged_counts, EventSelection, Rejection, SpeciesCounts,
};
use crate::{AnalysisConfig, Error, Result};
use ktopi_core::{
    CalibrationAccumulator, Collection, EventRecord, Histogram1D, ResponseMatrix, Species,
};
use std::fmt;

const TAG_AXIS: &str = "N_{ch}^{tag}";

/// Per-event diagnostics kept in the result; later ones are only logged
/// and counted in [`CutFlow::suppressed_diagnostics`].
pub const MAX_EVENT_DIAGNOSTICS: usize = 100;

/// Where kaons and pions are counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// PID-tagged reconstructed tracks, with unmixing.
    Reco,
    /// Generator-level particles by PDG code.
    Generator,
}

/// A condition that degrades the result without stopping the run.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// A stored count exceeded the collection capacity and was clipped.
    CountClipped {
        entry: u64,
        collection: Collection,
        count: i64,
        capacity: usize,
    },
    /// An entry could not be decoded and was skipped.
    UnreadableEntry { entry: u64 },
    /// No charged track contributed calibration values.
    EmptyCalibration,
    /// The averaged response matrix cannot be inverted.
    SingularResponse { determinant: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::CountClipped {
                entry,
                collection,
                count,
                capacity,
            } => write!(
                f,
                "{} = {count} > capacity {capacity} at entry {entry}, clipping",
                collection.count_column()
            ),
            Diagnostic::UnreadableEntry { entry } => {
                write!(f, "entry {entry} could not be read, skipping")
            }
            Diagnostic::EmptyCalibration => write!(
                f,
                "no tracks accumulated for PID calibration, corrected yields left empty"
            ),
            Diagnostic::SingularResponse { determinant } => write!(
                f,
                "PID response determinant {determinant:e} is too small, corrected yields left empty"
            ),
        }
    }
}

/// Event counts per selection stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CutFlow {
    pub processed: u64,
    pub unreadable: u64,
    pub failed_visible_energy: u64,
    pub failed_multiplicity: u64,
    pub failed_thrust_angle: u64,
    pub selected: u64,
    /// Per-event diagnostics logged beyond [`MAX_EVENT_DIAGNOSTICS`].
    pub suppressed_diagnostics: u64,
}

impl CutFlow {
    fn reject(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::VisibleEnergy => self.failed_visible_energy += 1,
            Rejection::ChargedMultiplicity => self.failed_multiplicity += 1,
            Rejection::ThrustAngle => self.failed_thrust_angle += 1,
        }
    }

    /// Events rejected by any cut.
    #[must_use]
    pub fn rejected(&self) -> u64 {
        self.failed_visible_energy + self.failed_multiplicity + self.failed_thrust_angle
    }
}

impl fmt::Display for CutFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "processed {}, unreadable {}, failed E_vis {}, failed N_ch {}, failed thrust {}, selected {}",
            self.processed,
            self.unreadable,
            self.failed_visible_energy,
            self.failed_multiplicity,
            self.failed_thrust_angle,
            self.selected
        )
    }
}

/// PID-corrected yields and their ratio.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedYields {
    pub kaons: Histogram1D,
    pub pions: Histogram1D,
    pub ratio: Histogram1D,
    /// Whether unmixing was applied; if not, all three are empty.
    pub applied: bool,
}

/// Output of a finished analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    pub level: Level,
    pub kaons: Histogram1D,
    pub pions: Histogram1D,
    pub ratio: Histogram1D,
    /// Present in reco mode only.
    pub corrected: Option<CorrectedYields>,
    /// Averaged response matrix, when any track was calibrated.
    pub response: Option<ResponseMatrix>,
    pub cut_flow: CutFlow,
    pub diagnostics: Vec<Diagnostic>,
}

impl AnalysisResult {
    /// Histograms in output order.
    #[must_use]
    pub fn histograms(&self) -> Vec<&Histogram1D> {
        let mut out = vec![&self.kaons, &self.pions, &self.ratio];
        if let Some(corrected) = &self.corrected {
            out.extend([&corrected.kaons, &corrected.pions, &corrected.ratio]);
        }
        out
    }
}

/// Event-loop state of one K/pi analysis.
#[derive(Debug)]
pub struct Analyzer {
    level: Level,
    selection: EventSelection,
    max_nch_tag: usize,
    kaons: Histogram1D,
    pions: Histogram1D,
    calibration: CalibrationAccumulator,
    cut_flow: CutFlow,
    diagnostics: Vec<Diagnostic>,
    event_diagnostics: usize,
}

impl Analyzer {
    /// Books the yield histograms for `config`.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let max_nch_tag = usize::try_from(config.max_nch_tag)
            .map_err(|_| Error::ConfigError("MaxNchTag must be non-negative".to_string()))?;
        let level = if config.is_gen {
            Level::Generator
        } else {
            Level::Reco
        };

        let (k_title, pi_title, k_axis, pi_axis) = match level {
            Level::Reco => (
                "Kaon candidates vs N_{ch}^{tag}",
                "Pion candidates vs N_{ch}^{tag}",
                "Yield (sum over events)",
                "Yield (sum over events)",
            ),
            Level::Generator => (
                "Generator-level kaons vs N_{ch}^{tag}",
                "Generator-level pions vs N_{ch}^{tag}",
                "N_{K}^{gen}",
                "N_{#pi}^{gen}",
            ),
        };
        let kaons = Histogram1D::new(
            "hK",
            k_title,
            config.n_bins(),
            -0.5,
            max_nch_tag as f64 + 0.5,
        )?
        .with_labels(TAG_AXIS, k_axis);
        let mut pions = kaons.clone_empty("hPi", pi_title);
        pions.set_y_label(pi_axis);

        Ok(Self {
            level,
            selection: EventSelection::from_config(config),
            max_nch_tag,
            kaons,
            pions,
            calibration: CalibrationAccumulator::new(),
            cut_flow: CutFlow::default(),
            diagnostics: Vec::new(),
            event_diagnostics: 0,
        })
    }

    #[must_use]
    pub fn level(&self) -> Level {
        self.level
    }

    #[must_use]
    pub fn cut_flow(&self) -> &CutFlow {
        &self.cut_flow
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    fn diagnose(&mut self, diagnostic: Diagnostic) {
        log::warn!("{diagnostic}");
        self.diagnostics.push(diagnostic);
    }

    fn diagnose_event(&mut self, diagnostic: Diagnostic) {
        if self.event_diagnostics < MAX_EVENT_DIAGNOSTICS {
            self.event_diagnostics += 1;
            self.diagnose(diagnostic);
        } else {
            log::warn!("{diagnostic}");
            self.cut_flow.suppressed_diagnostics += 1;
        }
    }

    /// Records that `entry` could not be read.
    pub fn skip_unreadable(&mut self, entry: u64) {
        self.cut_flow.processed += 1;
        self.cut_flow.unreadable += 1;
        self.diagnose_event(Diagnostic::UnreadableEntry { entry });
    }

    /// Applies the selection to one event and fills the yields if it passes.
    ///
    /// Returns the failed cut for a rejected event.
    #[allow(clippy::cast_precision_loss)]
    pub fn process_event(&mut self, entry: u64, record: &EventRecord) -> Option<Rejection> {
        self.cut_flow.processed += 1;

        for collection in [Collection::Reco, Collection::Gen] {
            if collection == Collection::Gen && self.level != Level::Generator {
                continue;
            }
            let count = record.count(collection);
            if collection.overflows(count) {
                self.diagnose_event(Diagnostic::CountClipped {
                    entry,
                    collection,
                    count,
                    capacity: collection.capacity(),
                });
            }
        }

        if let Some(rejection) = self.selection.rejection(record) {
            self.cut_flow.reject(rejection);
            return Some(rejection);
        }
        self.cut_flow.selected += 1;

        let nch_tag = tag_multiplicity(&record.reco).min(self.max_nch_tag);
        let SpeciesCounts { kaons, pions } = match self.level {
            Level::Generator => generator_counts(&record.gen),
            Level::Reco => {
                self.accumulate_calibration(record);
                tagged_counts(&record.reco)
            }
        };

        let x = nch_tag as f64;
        self.kaons.fill(x, kaons as f64);
        self.pions.fill(x, pions as f64);
        None
    }

    fn accumulate_calibration(&mut self, record: &EventRecord) {
        let reco = &record.reco;
        let k_as_k = reco.efficiency(Species::Kaon, Species::Kaon);
        let k_as_pi = reco.efficiency(Species::Kaon, Species::Pion);
        let pi_as_k = reco.efficiency(Species::Pion, Species::Kaon);
        let pi_as_pi = reco.efficiency(Species::Pion, Species::Pion);
        for (i, charge) in reco.charges().iter().enumerate() {
            if *charge != 0.0 {
                self.calibration
                    .add(k_as_k[i], k_as_pi[i], pi_as_k[i], pi_as_pi[i]);
            }
        }
    }

    /// Builds the ratio and, in reco mode, the PID-corrected yields.
    ///
    /// # Errors
    /// Returns an error if histogram arithmetic fails.
    pub fn finalize(mut self) -> Result<AnalysisResult> {
        log::info!("cut flow: {}", self.cut_flow);

        let ratio_title = match self.level {
            Level::Reco => ("K/#pi yield ratio vs N_{ch}^{tag}", "K/#pi (reco)"),
            Level::Generator => (
                "Generator-level K/#pi yield ratio vs N_{ch}^{tag}",
                "K/#pi (gen)",
            ),
        };
        let mut ratio = self.kaons.clone_as("hKoverPi", ratio_title.0);
        ratio.set_y_label(ratio_title.1);
        ratio.divide(&self.pions)?;

        let response = self.calibration.average();
        let corrected = match self.level {
            Level::Generator => None,
            Level::Reco => Some(self.correct(response)?),
        };

        Ok(AnalysisResult {
            level: self.level,
            kaons: self.kaons,
            pions: self.pions,
            ratio,
            corrected,
            response,
            cut_flow: self.cut_flow,
            diagnostics: self.diagnostics,
        })
    }

    fn correct(&mut self, response: Option<ResponseMatrix>) -> Result<CorrectedYields> {
        let mut kaons = self
            .kaons
            .clone_empty("hKCorrected", "PID-corrected K yield vs N_{ch}^{tag}");
        kaons.set_y_label("Corrected K yield");
        let mut pions = self
            .kaons
            .clone_empty("hPiCorrected", "PID-corrected #pi yield vs N_{ch}^{tag}");
        pions.set_y_label("Corrected #pi yield");
        let mut ratio = self
            .kaons
            .clone_empty("hKoverPiCorrected", "K/#pi vs N_{ch}^{tag}");
        ratio.set_y_label("K/#pi (PID-corrected)");

        let applied = match response {
            None => {
                self.diagnose(Diagnostic::EmptyCalibration);
                false
            }
            Some(matrix) => {
                log::info!(
                    "average K/pi PID response: KAsK={:.4} PiAsK={:.4} KAsPi={:.4} PiAsPi={:.4} ({} tracks)",
                    matrix.k_as_k,
                    matrix.pi_as_k,
                    matrix.k_as_pi,
                    matrix.pi_as_pi,
                    self.calibration.tracks()
                );
                let applied =
                    matrix.unmix_histograms(&self.kaons, &self.pions, &mut kaons, &mut pions)?;
                if !applied {
                    self.diagnose(Diagnostic::SingularResponse {
                        determinant: matrix.determinant(),
                    });
                }
                applied
            }
        };

        if applied {
            let title = ratio.title().to_string();
            let y_label = ratio.y_label().to_string();
            ratio = kaons.clone_as("hKoverPiCorrected", title);
            ratio.set_y_label(y_label);
            ratio.divide(&pions)?;
        }

        Ok(CorrectedYields {
            kaons,
            pions,
            ratio,
            applied,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ktopi_core::schema::MAX_RECO;

    fn selected_event(kaon_scores: &[i64], pion_scores: &[i64]) -> EventRecord {
        let n = kaon_scores.len().max(pion_scores.len());
        let mut record = EventRecord::new();
        record.scalars.nch = 10;
        record.scalars.thrust_z = 0.0;
        record.reco.count = n as i64;
        record.reco.e[..n].fill(60.0 / n as f64);
        record.reco.charge[..n].fill(1.0);
        record.reco.pid_kaon[..kaon_scores.len()].copy_from_slice(kaon_scores);
        record.reco.pid_pion[..pion_scores.len()].copy_from_slice(pion_scores);
        record
    }

    fn set_calibration(record: &mut EventRecord, matrix: ResponseMatrix) {
        let n = record.reco.len();
        let values = [
            (Species::Kaon, Species::Kaon, matrix.k_as_k),
            (Species::Kaon, Species::Pion, matrix.k_as_pi),
            (Species::Pion, Species::Kaon, matrix.pi_as_k),
            (Species::Pion, Species::Pion, matrix.pi_as_pi),
        ];
        for (truth, tagged, value) in values {
            record.reco.efficiency[truth.index()][tagged.index()][..n].fill(value);
        }
    }

    fn small_config() -> AnalysisConfig {
        AnalysisConfig::default().with_max_nch_tag(10)
    }

    #[test]
    fn test_booking_uses_unit_bins() {
        let analyzer = Analyzer::new(&small_config()).unwrap();
        assert_eq!(analyzer.kaons.n_bins(), 11);
        assert_relative_eq!(analyzer.kaons.x_min(), -0.5);
        assert_relative_eq!(analyzer.kaons.x_max(), 10.5);
        assert_eq!(analyzer.pions.name(), "hPi");
        assert_eq!(analyzer.kaons.x_label(), TAG_AXIS);
    }

    #[test]
    fn test_coarse_binning() {
        let analyzer = Analyzer::new(&AnalysisConfig::default().with_nch_tag_bins(16)).unwrap();
        assert_eq!(analyzer.kaons.n_bins(), 16);
        assert_relative_eq!(analyzer.kaons.bin_width(), 61.0 / 16.0);
    }

    #[test]
    fn test_fill_at_tag_multiplicity() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let record = selected_event(&[2, 2, 0], &[0, 0, 3]);
        assert_eq!(analyzer.process_event(0, &record), None);
        assert_relative_eq!(analyzer.kaons.bin_content(3), 2.0);
        assert_relative_eq!(analyzer.pions.bin_content(3), 1.0);
        assert_eq!(analyzer.cut_flow().selected, 1);
    }

    #[test]
    fn test_tag_multiplicity_clamped_to_last_bin() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let record = selected_event(&[2; 14], &[]);
        analyzer.process_event(0, &record);
        assert_relative_eq!(analyzer.kaons.bin_content(10), 14.0);
        assert_relative_eq!(analyzer.kaons.integral(), 14.0);
    }

    #[test]
    fn test_rejected_event_fills_nothing() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let mut record = selected_event(&[2], &[2]);
        record.scalars.nch = 3;
        assert_eq!(
            analyzer.process_event(0, &record),
            Some(Rejection::ChargedMultiplicity)
        );
        assert!(analyzer.kaons.is_zero());
        assert_eq!(analyzer.cut_flow().failed_multiplicity, 1);
        assert_eq!(analyzer.cut_flow().rejected(), 1);
    }

    #[test]
    fn test_overflowing_count_emits_one_diagnostic() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let mut record = selected_event(&[], &[]);
        record.reco.count = MAX_RECO as i64 + 1;
        record.reco.e.fill(0.01);
        analyzer.process_event(7, &record);

        assert_eq!(analyzer.diagnostics().len(), 1);
        assert_eq!(
            analyzer.diagnostics()[0],
            Diagnostic::CountClipped {
                entry: 7,
                collection: Collection::Reco,
                count: MAX_RECO as i64 + 1,
                capacity: MAX_RECO,
            }
        );
    }

    #[test]
    fn test_oversized_binning_is_an_error() {
        let mut config = small_config();
        config.max_nch_tag = i64::MAX;
        assert!(matches!(Analyzer::new(&config), Err(Error::ConfigError(_))));

        let mut config = small_config();
        config.nch_tag_bins = Some(usize::MAX);
        assert!(matches!(Analyzer::new(&config), Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_event_diagnostics_are_bounded() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let extra = 25;
        for entry in 0..(MAX_EVENT_DIAGNOSTICS + extra) as u64 {
            analyzer.skip_unreadable(entry);
        }
        assert_eq!(analyzer.diagnostics().len(), MAX_EVENT_DIAGNOSTICS);
        assert_eq!(analyzer.cut_flow().suppressed_diagnostics, extra as u64);
        assert_eq!(
            analyzer.cut_flow().unreadable,
            (MAX_EVENT_DIAGNOSTICS + extra) as u64
        );

        let result = analyzer.finalize().unwrap();
        assert_eq!(result.diagnostics.len(), MAX_EVENT_DIAGNOSTICS + 1);
        assert_eq!(
            result.diagnostics.last(),
            Some(&Diagnostic::EmptyCalibration)
        );
    }

    #[test]
    fn test_gen_count_checked_only_in_generator_mode() {
        let mut record = selected_event(&[2], &[2]);
        record.gen.count = i64::MAX;

        let mut reco = Analyzer::new(&small_config()).unwrap();
        reco.process_event(0, &record);
        assert!(reco.diagnostics().is_empty());

        let mut gen = Analyzer::new(&small_config().with_gen_level(true)).unwrap();
        gen.process_event(0, &record);
        assert_eq!(gen.diagnostics().len(), 1);
    }

    #[test]
    fn test_generator_mode_ignores_pid() {
        let mut analyzer = Analyzer::new(&small_config().with_gen_level(true)).unwrap();
        let mut record = selected_event(&[2, 2, 2, 2, 2], &[2, 2, 2, 2, 2]);
        let ids = [321, -321, 211, 211, 211];
        record.gen.count = 5;
        record.gen.id[..5].copy_from_slice(&ids);
        analyzer.process_event(0, &record);

        let result = analyzer.finalize().unwrap();
        assert_eq!(result.level, Level::Generator);
        assert_relative_eq!(result.kaons.bin_content(5), 2.0);
        assert_relative_eq!(result.pions.bin_content(5), 3.0);
        assert_relative_eq!(result.ratio.bin_content(5), 2.0 / 3.0);
        assert!(result.corrected.is_none());
        assert_eq!(result.histograms().len(), 3);
        assert_eq!(result.kaons.title(), "Generator-level kaons vs N_{ch}^{tag}");
    }

    #[test]
    fn test_unmixing_recovers_true_yields() {
        let matrix = ResponseMatrix {
            k_as_k: 0.8,
            k_as_pi: 0.1,
            pi_as_k: 0.05,
            pi_as_pi: 0.9,
        };
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        // 4 tagged kaons, 2 tagged pions, multiplicity 6
        let mut record = selected_event(&[2, 2, 2, 2, 0, 0], &[0, 0, 0, 0, 2, 2]);
        set_calibration(&mut record, matrix);
        analyzer.process_event(0, &record);

        let result = analyzer.finalize().unwrap();
        let corrected = result.corrected.as_ref().unwrap();
        assert!(corrected.applied);
        assert!(result.diagnostics.is_empty());

        let (true_k, true_pi) = matrix.unmix(4.0, 2.0).unwrap();
        assert_relative_eq!(corrected.kaons.bin_content(6), true_k, epsilon = 1e-12);
        assert_relative_eq!(corrected.pions.bin_content(6), true_pi, epsilon = 1e-12);
        assert_relative_eq!(
            corrected.ratio.bin_content(6),
            true_k / true_pi,
            epsilon = 1e-12
        );
        let (fk, fpi) = matrix.apply(true_k, true_pi);
        assert_relative_eq!(fk, 4.0, epsilon = 1e-12);
        assert_relative_eq!(fpi, 2.0, epsilon = 1e-12);
        let response = result.response.unwrap();
        assert_relative_eq!(response.k_as_k, 0.8, epsilon = 1e-12);
    }

    #[test]
    fn test_singular_response_leaves_corrected_empty() {
        let matrix = ResponseMatrix {
            k_as_k: 0.5,
            k_as_pi: 0.5,
            pi_as_k: 0.5,
            pi_as_pi: 0.5,
        };
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let mut record = selected_event(&[2, 0], &[0, 2]);
        set_calibration(&mut record, matrix);
        analyzer.process_event(0, &record);

        let result = analyzer.finalize().unwrap();
        let corrected = result.corrected.as_ref().unwrap();
        assert!(!corrected.applied);
        assert!(corrected.kaons.is_zero());
        assert!(corrected.pions.is_zero());
        assert!(corrected.ratio.is_zero());
        assert!(matches!(
            result.diagnostics.as_slice(),
            [Diagnostic::SingularResponse { .. }]
        ));
        assert_relative_eq!(result.kaons.bin_content(2), 1.0);
    }

    #[test]
    fn test_neutral_tracks_do_not_calibrate() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        let mut record = selected_event(&[2], &[0]);
        record.reco.charge[0] = 0.0;
        analyzer.process_event(0, &record);

        let result = analyzer.finalize().unwrap();
        assert!(result.response.is_none());
        assert_eq!(result.diagnostics, vec![Diagnostic::EmptyCalibration]);
        let corrected = result.corrected.unwrap();
        assert!(!corrected.applied);
        assert_eq!(corrected.kaons.name(), "hKCorrected");
    }

    #[test]
    fn test_unreadable_entry_is_counted() {
        let mut analyzer = Analyzer::new(&small_config()).unwrap();
        analyzer.skip_unreadable(3);
        assert_eq!(analyzer.cut_flow().unreadable, 1);
        assert_eq!(
            analyzer.diagnostics(),
            &[Diagnostic::UnreadableEntry { entry: 3 }]
        );
    }
}
