//! Event selection cuts and per-event counting.
//!
//! All counting works on the valid prefix of each collection, so counts
//! above capacity are already clipped here.

use crate::AnalysisConfig;
use ktopi_core::{EventRecord, GenParticles, RecoParticles, Species};
use std::fmt;

/// Fraction of the reference energy the visible energy must exceed.
pub const MIN_VISIBLE_FRACTION: f64 = 0.5;

/// Why an event failed the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rejection {
    /// `sum(RecoE) / EcmRef` at or below the threshold.
    VisibleEnergy,
    /// Charged multiplicity below the minimum.
    ChargedMultiplicity,
    /// Thrust axis outside the polar-angle window, or undefined.
    ThrustAngle,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::VisibleEnergy => write!(f, "visible energy"),
            Rejection::ChargedMultiplicity => write!(f, "charged multiplicity"),
            Rejection::ThrustAngle => write!(f, "thrust angle"),
        }
    }
}

/// Event-level cuts, applied in order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EventSelection {
    pub ecm_ref: f64,
    pub min_nch: i64,
    /// Radians.
    pub min_theta: f64,
    /// Radians.
    pub max_theta: f64,
}

impl EventSelection {
    #[must_use]
    pub fn from_config(config: &AnalysisConfig) -> Self {
        let (min_theta, max_theta) = config.theta_window();
        Self {
            ecm_ref: config.ecm_ref,
            min_nch: config.min_nch,
            min_theta,
            max_theta,
        }
    }

    /// Returns the first cut `record` fails, or `None` if it is selected.
    #[must_use]
    pub fn rejection(&self, record: &EventRecord) -> Option<Rejection> {
        if visible_energy(&record.reco) / self.ecm_ref <= MIN_VISIBLE_FRACTION {
            return Some(Rejection::VisibleEnergy);
        }
        if record.scalars.nch < self.min_nch {
            return Some(Rejection::ChargedMultiplicity);
        }
        let theta = record.scalars.thrust_polar_angle();
        // NaN (|ThrustZ| > 1) fails both comparisons
        let inside = theta > self.min_theta && theta < self.max_theta;
        if !inside {
            return Some(Rejection::ThrustAngle);
        }
        None
    }
}

/// Sum of reconstructed energies.
#[must_use]
pub fn visible_energy(reco: &RecoParticles) -> f64 {
    reco.energies().iter().sum()
}

/// Number of reconstructed tracks tagged as kaon, pion or proton.
#[must_use]
pub fn tag_multiplicity(reco: &RecoParticles) -> usize {
    let kaon = reco.pid(Species::Kaon);
    let pion = reco.pid(Species::Pion);
    let proton = reco.pid(Species::Proton);
    (0..reco.len())
        .filter(|&i| {
            Species::is_tagged(kaon[i]) || Species::is_tagged(pion[i]) || Species::is_tagged(proton[i])
        })
        .count()
}

/// Kaon and pion counts of one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpeciesCounts {
    pub kaons: u64,
    pub pions: u64,
}

/// Counts PID-tagged kaons and pions. A track may count as both.
#[must_use]
pub fn tagged_counts(reco: &RecoParticles) -> SpeciesCounts {
    let count = |species| {
        reco.pid(species)
            .iter()
            .filter(|&&score| Species::is_tagged(score))
            .count() as u64
    };
    SpeciesCounts {
        kaons: count(Species::Kaon),
        pions: count(Species::Pion),
    }
}

/// Counts generator-level charged kaons and pions by PDG code.
#[must_use]
pub fn generator_counts(gen: &GenParticles) -> SpeciesCounts {
    let count = |species: Species| {
        gen.ids()
            .iter()
            .filter(|&&id| species.matches_pdg(id))
            .count() as u64
    };
    SpeciesCounts {
        kaons: count(Species::Kaon),
        pions: count(Species::Pion),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn selection() -> EventSelection {
        EventSelection::from_config(&AnalysisConfig::default())
    }

    fn passing_event() -> EventRecord {
        let mut record = EventRecord::new();
        record.scalars.nch = 10;
        record.scalars.thrust_z = 0.0;
        record.reco.count = 2;
        record.reco.e[0] = 30.0;
        record.reco.e[1] = 20.0;
        record
    }

    #[test]
    fn test_passing_event_is_selected() {
        assert_eq!(selection().rejection(&passing_event()), None);
    }

    #[test]
    fn test_visible_energy_threshold_is_exclusive() {
        let cuts = EventSelection {
            ecm_ref: 100.0,
            ..selection()
        };
        let mut record = passing_event();
        assert_eq!(cuts.rejection(&record), Some(Rejection::VisibleEnergy));
        record.reco.e[0] = 30.5;
        assert_eq!(cuts.rejection(&record), None);
    }

    #[test]
    fn test_energy_beyond_count_is_ignored() {
        let mut record = passing_event();
        record.reco.count = 1;
        record.reco.e[1] = 1000.0;
        assert_eq!(
            selection().rejection(&record),
            Some(Rejection::VisibleEnergy)
        );
    }

    #[test]
    fn test_multiplicity_cut() {
        let mut record = passing_event();
        record.scalars.nch = 6;
        assert_eq!(
            selection().rejection(&record),
            Some(Rejection::ChargedMultiplicity)
        );
        record.scalars.nch = 7;
        assert_eq!(selection().rejection(&record), None);
    }

    #[test]
    fn test_thrust_window() {
        let mut record = passing_event();
        record.scalars.thrust_z = 0.95;
        assert_eq!(selection().rejection(&record), Some(Rejection::ThrustAngle));
        record.scalars.thrust_z = -0.95;
        assert_eq!(selection().rejection(&record), Some(Rejection::ThrustAngle));
        record.scalars.thrust_z = 0.8;
        assert_eq!(selection().rejection(&record), None);
        record.scalars.thrust_z = 1.5;
        assert_eq!(selection().rejection(&record), Some(Rejection::ThrustAngle));
    }

    #[test]
    fn test_tag_multiplicity_and_counts() {
        let mut record = EventRecord::new();
        record.reco.count = 5;
        record.reco.pid_kaon[..5].copy_from_slice(&[2, 3, 0, 1, 2]);
        record.reco.pid_pion[..5].copy_from_slice(&[0, 2, 2, 1, 0]);
        record.reco.pid_proton[..5].copy_from_slice(&[0, 0, 0, 2, 0]);
        record.reco.pid_kaon[5] = 3;

        assert_eq!(tag_multiplicity(&record.reco), 5);
        assert_eq!(
            tagged_counts(&record.reco),
            SpeciesCounts { kaons: 3, pions: 2 }
        );
    }

    #[test]
    fn test_generator_counts_by_pdg() {
        let mut record = EventRecord::new();
        let ids = [321, -321, 211, 211, 211, 2212, 22, -211];
        record.gen.count = ids.len() as i64;
        record.gen.id[..ids.len()].copy_from_slice(&ids);
        assert_eq!(
            generator_counts(&record.gen),
            SpeciesCounts { kaons: 2, pions: 4 }
        );
    }
}
