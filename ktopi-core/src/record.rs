//! Fixed-capacity event record in Structure of Arrays (`SoA`) layout.
//!
//! Each particle collection stores one boxed array per attribute, all of
//! the same fixed capacity, plus the count read from the store. Only the
//! prefix `[0, min(count, capacity))` is valid; the accessor methods return
//! slices over that prefix so callers never index past it.
//!
//! Storage is allocated once in [`EventRecord::new`] and overwritten in
//! place on every entry read.

use std::sync::OnceLock;

use crate::pid::Species;
use crate::schema::{Collection, ColumnSpec, ColumnVisitor, Slot, ValueKind};

/// Sentinel stored in cross-collection reference columns for "unmatched".
///
/// Any negative handle is treated as unmatched.
pub const UNMATCHED: i64 = -1;

/// Resolves an index handle into a collection with `target_len` valid entries.
///
/// Returns `None` for the sentinel or for handles past the valid prefix.
#[must_use]
pub fn resolve_handle(handle: i64, target_len: usize) -> Option<usize> {
    usize::try_from(handle).ok().filter(|&index| index < target_len)
}

fn zeros_f64(capacity: usize) -> Box<[f64]> {
    vec![0.0; capacity].into_boxed_slice()
}

fn zeros_i64(capacity: usize) -> Box<[i64]> {
    vec![0; capacity].into_boxed_slice()
}

fn scalar_f64(visitor: &mut dyn ColumnVisitor, name: &'static str, value: &mut f64) {
    visitor.visit(
        ColumnSpec::scalar(name, ValueKind::F64),
        Slot::F64(std::slice::from_mut(value)),
    );
}

fn scalar_i64(visitor: &mut dyn ColumnVisitor, name: &'static str, value: &mut i64) {
    visitor.visit(
        ColumnSpec::scalar(name, ValueKind::I64),
        Slot::I64(std::slice::from_mut(value)),
    );
}

fn array_f64(
    visitor: &mut dyn ColumnVisitor,
    name: &'static str,
    collection: Collection,
    values: &mut [f64],
) {
    visitor.visit(
        ColumnSpec::array(name, ValueKind::F64, collection),
        Slot::F64(values),
    );
}

fn array_i64(
    visitor: &mut dyn ColumnVisitor,
    name: &'static str,
    collection: Collection,
    values: &mut [i64],
) {
    visitor.visit(
        ColumnSpec::array(name, ValueKind::I64, collection),
        Slot::I64(values),
    );
}

/// Event-level scalars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventScalars {
    pub ecm: f64,
    pub nch: i64,
    pub run: i64,
    pub event: i64,
    pub fill: i64,
    pub good_nch: i64,
    pub good_nneu: i64,
    pub total_ech: f64,
    pub total_eneu: f64,
    pub pass_nch: i64,
    pub pass_thrust: i64,
    pub pass_total_e: i64,
    pub pass_all: i64,
    pub thrust: f64,
    pub thrust_x: f64,
    pub thrust_y: f64,
    pub thrust_z: f64,
    pub thrust_theta: f64,
}

impl EventScalars {
    /// Polar angle of the thrust axis, `acos(thrust_z)`, in radians.
    #[must_use]
    pub fn thrust_polar_angle(&self) -> f64 {
        self.thrust_z.acos()
    }

    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) {
        scalar_f64(v, "Ecm", &mut self.ecm);
        scalar_i64(v, "Nch", &mut self.nch);
        scalar_i64(v, "Run", &mut self.run);
        scalar_i64(v, "Event", &mut self.event);
        scalar_i64(v, "Fill", &mut self.fill);
        scalar_i64(v, "GoodNch", &mut self.good_nch);
        scalar_i64(v, "GoodNneu", &mut self.good_nneu);
        scalar_f64(v, "TotalEch", &mut self.total_ech);
        scalar_f64(v, "TotalEneu", &mut self.total_eneu);
        scalar_i64(v, "PassNch", &mut self.pass_nch);
        scalar_i64(v, "PassThrust", &mut self.pass_thrust);
        scalar_i64(v, "PassTotalE", &mut self.pass_total_e);
        scalar_i64(v, "PassAll", &mut self.pass_all);
        scalar_f64(v, "Thrust", &mut self.thrust);
        scalar_f64(v, "ThrustX", &mut self.thrust_x);
        scalar_f64(v, "ThrustY", &mut self.thrust_y);
        scalar_f64(v, "ThrustZ", &mut self.thrust_z);
        scalar_f64(v, "ThrustTheta", &mut self.thrust_theta);
    }
}

/// Generator-level (truth) particles.
#[derive(Debug, Clone, PartialEq)]
pub struct GenParticles {
    /// Count as stored; may exceed capacity.
    pub count: i64,
    pub px: Box<[f64]>,
    pub py: Box<[f64]>,
    pub pz: Box<[f64]>,
    pub e: Box<[f64]>,
    pub m: Box<[f64]>,
    /// PDG identifier.
    pub id: Box<[i64]>,
    pub status: Box<[i64]>,
    pub parent: Box<[i64]>,
    /// Handle into the reconstructed collection.
    pub match_index: Box<[i64]>,
    pub match_angle: Box<[f64]>,
}

impl GenParticles {
    const COLLECTION: Collection = Collection::Gen;

    fn new() -> Self {
        let n = Self::COLLECTION.capacity();
        Self {
            count: 0,
            px: zeros_f64(n),
            py: zeros_f64(n),
            pz: zeros_f64(n),
            e: zeros_f64(n),
            m: zeros_f64(n),
            id: zeros_i64(n),
            status: zeros_i64(n),
            parent: zeros_i64(n),
            match_index: zeros_i64(n),
            match_angle: zeros_f64(n),
        }
    }

    /// Valid prefix length (count clipped to capacity).
    #[must_use]
    pub fn len(&self) -> usize {
        Self::COLLECTION.clip(self.count)
    }

    /// Returns true if no particle is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// PDG identifiers over the valid prefix.
    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.id[..self.len()]
    }

    /// Energies over the valid prefix.
    #[must_use]
    pub fn energies(&self) -> &[f64] {
        &self.e[..self.len()]
    }

    /// Reconstructed particle matched to generator particle `index`.
    #[must_use]
    pub fn matched_reco(&self, index: usize, reco: &RecoParticles) -> Option<usize> {
        if index >= self.len() {
            return None;
        }
        resolve_handle(self.match_index[index], reco.len())
    }

    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) {
        let c = Self::COLLECTION;
        scalar_i64(v, "NGen", &mut self.count);
        array_f64(v, "GenPx", c, &mut self.px);
        array_f64(v, "GenPy", c, &mut self.py);
        array_f64(v, "GenPz", c, &mut self.pz);
        array_f64(v, "GenE", c, &mut self.e);
        array_f64(v, "GenM", c, &mut self.m);
        array_i64(v, "GenID", c, &mut self.id);
        array_i64(v, "GenStatus", c, &mut self.status);
        array_i64(v, "GenParent", c, &mut self.parent);
        array_i64(v, "GenMatchIndex", c, &mut self.match_index);
        array_f64(v, "GenMatchAngle", c, &mut self.match_angle);
    }
}

const EFFICIENCY_COLUMNS: [[&str; 3]; 3] = [
    [
        "RecoEfficiencyKAsK",
        "RecoEfficiencyKAsPi",
        "RecoEfficiencyKAsP",
    ],
    [
        "RecoEfficiencyPiAsK",
        "RecoEfficiencyPiAsPi",
        "RecoEfficiencyPiAsP",
    ],
    [
        "RecoEfficiencyPAsK",
        "RecoEfficiencyPAsPi",
        "RecoEfficiencyPAsP",
    ],
];

/// Reconstructed particles with PID scores and calibration values.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoParticles {
    /// Count as stored; may exceed capacity.
    pub count: i64,
    pub px: Box<[f64]>,
    pub py: Box<[f64]>,
    pub pz: Box<[f64]>,
    pub e: Box<[f64]>,
    pub charge: Box<[f64]>,
    pub id: Box<[i64]>,
    pub track_length: Box<[f64]>,
    pub track_d0: Box<[f64]>,
    pub track_z0: Box<[f64]>,
    pub pid_electron: Box<[i64]>,
    pub pid_proton: Box<[i64]>,
    pub pid_kaon: Box<[i64]>,
    pub pid_pion: Box<[i64]>,
    pub pid_heavy: Box<[i64]>,
    pub pid_q_proton: Box<[f64]>,
    pub pid_q_kaon: Box<[f64]>,
    pub mu_id: Box<[i64]>,
    pub ele_id: Box<[i64]>,
    pub conversion_id: Box<[i64]>,
    pub good_track: Box<[i64]>,
    pub good_neutral: Box<[i64]>,
    /// Calibration values indexed `[true species][tagged species]`.
    pub efficiency: [[Box<[f64]>; 3]; 3],
}

impl RecoParticles {
    const COLLECTION: Collection = Collection::Reco;

    fn new() -> Self {
        let n = Self::COLLECTION.capacity();
        Self {
            count: 0,
            px: zeros_f64(n),
            py: zeros_f64(n),
            pz: zeros_f64(n),
            e: zeros_f64(n),
            charge: zeros_f64(n),
            id: zeros_i64(n),
            track_length: zeros_f64(n),
            track_d0: zeros_f64(n),
            track_z0: zeros_f64(n),
            pid_electron: zeros_i64(n),
            pid_proton: zeros_i64(n),
            pid_kaon: zeros_i64(n),
            pid_pion: zeros_i64(n),
            pid_heavy: zeros_i64(n),
            pid_q_proton: zeros_f64(n),
            pid_q_kaon: zeros_f64(n),
            mu_id: zeros_i64(n),
            ele_id: zeros_i64(n),
            conversion_id: zeros_i64(n),
            good_track: zeros_i64(n),
            good_neutral: zeros_i64(n),
            efficiency: std::array::from_fn(|_| std::array::from_fn(|_| zeros_f64(n))),
        }
    }

    /// Valid prefix length (count clipped to capacity).
    #[must_use]
    pub fn len(&self) -> usize {
        Self::COLLECTION.clip(self.count)
    }

    /// Returns true if no particle is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Energies over the valid prefix.
    #[must_use]
    pub fn energies(&self) -> &[f64] {
        &self.e[..self.len()]
    }

    /// Charges over the valid prefix.
    #[must_use]
    pub fn charges(&self) -> &[f64] {
        &self.charge[..self.len()]
    }

    /// Categorical identification score for `species` over the valid prefix.
    #[must_use]
    pub fn pid(&self, species: Species) -> &[i64] {
        let scores = match species {
            Species::Kaon => &self.pid_kaon,
            Species::Pion => &self.pid_pion,
            Species::Proton => &self.pid_proton,
        };
        &scores[..self.len()]
    }

    /// Probability that a true `truth` particle is tagged as `tagged`,
    /// over the valid prefix.
    #[must_use]
    pub fn efficiency(&self, truth: Species, tagged: Species) -> &[f64] {
        &self.efficiency[truth.index()][tagged.index()][..self.len()]
    }

    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) {
        let c = Self::COLLECTION;
        scalar_i64(v, "NReco", &mut self.count);
        array_f64(v, "RecoPx", c, &mut self.px);
        array_f64(v, "RecoPy", c, &mut self.py);
        array_f64(v, "RecoPz", c, &mut self.pz);
        array_f64(v, "RecoE", c, &mut self.e);
        array_f64(v, "RecoCharge", c, &mut self.charge);
        array_i64(v, "RecoID", c, &mut self.id);
        array_f64(v, "RecoTrackLength", c, &mut self.track_length);
        array_f64(v, "RecoTrackD0", c, &mut self.track_d0);
        array_f64(v, "RecoTrackZ0", c, &mut self.track_z0);
        array_i64(v, "RecoPIDElectron", c, &mut self.pid_electron);
        array_i64(v, "RecoPIDProton", c, &mut self.pid_proton);
        array_i64(v, "RecoPIDKaon", c, &mut self.pid_kaon);
        array_i64(v, "RecoPIDPion", c, &mut self.pid_pion);
        array_i64(v, "RecoPIDHeavy", c, &mut self.pid_heavy);
        array_f64(v, "RecoPIDQProton", c, &mut self.pid_q_proton);
        array_f64(v, "RecoPIDQKaon", c, &mut self.pid_q_kaon);
        array_i64(v, "RecoMuID", c, &mut self.mu_id);
        array_i64(v, "RecoEleID", c, &mut self.ele_id);
        array_i64(v, "RecoConversionID", c, &mut self.conversion_id);
        array_i64(v, "RecoGoodTrack", c, &mut self.good_track);
        array_i64(v, "RecoGoodNeutral", c, &mut self.good_neutral);
        for (names, row) in EFFICIENCY_COLUMNS.iter().zip(self.efficiency.iter_mut()) {
            for (name, values) in names.iter().zip(row.iter_mut()) {
                array_f64(v, *name, c, values);
            }
        }
    }
}

/// Simulation-level particles.
#[derive(Debug, Clone, PartialEq)]
pub struct SimParticles {
    /// Count as stored; may exceed capacity.
    pub count: i64,
    pub px: Box<[f64]>,
    pub py: Box<[f64]>,
    pub pz: Box<[f64]>,
    pub e: Box<[f64]>,
    pub id: Box<[i64]>,
}

impl SimParticles {
    const COLLECTION: Collection = Collection::Sim;

    fn new() -> Self {
        let n = Self::COLLECTION.capacity();
        Self {
            count: 0,
            px: zeros_f64(n),
            py: zeros_f64(n),
            pz: zeros_f64(n),
            e: zeros_f64(n),
            id: zeros_i64(n),
        }
    }

    /// Valid prefix length (count clipped to capacity).
    #[must_use]
    pub fn len(&self) -> usize {
        Self::COLLECTION.clip(self.count)
    }

    /// Returns true if no particle is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// PDG identifiers over the valid prefix.
    #[must_use]
    pub fn ids(&self) -> &[i64] {
        &self.id[..self.len()]
    }

    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) {
        let c = Self::COLLECTION;
        scalar_i64(v, "NSim", &mut self.count);
        array_f64(v, "SimPx", c, &mut self.px);
        array_f64(v, "SimPy", c, &mut self.py);
        array_f64(v, "SimPz", c, &mut self.pz);
        array_f64(v, "SimE", c, &mut self.e);
        array_i64(v, "SimID", c, &mut self.id);
    }
}

/// K0S -> pi+ pi- candidates.
///
/// `sim1_id`/`sim2_id` point into [`SimParticles`], `reco1_id`/`reco2_id`
/// into [`RecoParticles`]. Both are plain handles, see [`UNMATCHED`].
#[derive(Debug, Clone, PartialEq)]
pub struct KShortCandidates {
    /// Count as stored; may exceed capacity.
    pub count: i64,
    pub px: Box<[f64]>,
    pub py: Box<[f64]>,
    pub pz: Box<[f64]>,
    pub e: Box<[f64]>,
    pub sim1_id: Box<[i64]>,
    pub sim2_id: Box<[i64]>,
    pub reco1_id: Box<[i64]>,
    pub reco2_id: Box<[i64]>,
    pub reco1_angle: Box<[f64]>,
    pub reco2_angle: Box<[f64]>,
    pub reco_px: Box<[f64]>,
    pub reco_py: Box<[f64]>,
    pub reco_pz: Box<[f64]>,
    pub reco_e: Box<[f64]>,
}

impl KShortCandidates {
    const COLLECTION: Collection = Collection::KShort;

    fn new() -> Self {
        let n = Self::COLLECTION.capacity();
        Self {
            count: 0,
            px: zeros_f64(n),
            py: zeros_f64(n),
            pz: zeros_f64(n),
            e: zeros_f64(n),
            sim1_id: zeros_i64(n),
            sim2_id: zeros_i64(n),
            reco1_id: zeros_i64(n),
            reco2_id: zeros_i64(n),
            reco1_angle: zeros_f64(n),
            reco2_angle: zeros_f64(n),
            reco_px: zeros_f64(n),
            reco_py: zeros_f64(n),
            reco_pz: zeros_f64(n),
            reco_e: zeros_f64(n),
        }
    }

    /// Valid prefix length (count clipped to capacity).
    #[must_use]
    pub fn len(&self) -> usize {
        Self::COLLECTION.clip(self.count)
    }

    /// Returns true if no candidate is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reconstructed daughters of candidate `index`, resolved against `reco`.
    ///
    /// Returns `None` if `index` is outside the valid prefix.
    #[must_use]
    pub fn reco_legs(
        &self,
        index: usize,
        reco: &RecoParticles,
    ) -> Option<(Option<usize>, Option<usize>)> {
        (index < self.len()).then(|| {
            (
                resolve_handle(self.reco1_id[index], reco.len()),
                resolve_handle(self.reco2_id[index], reco.len()),
            )
        })
    }

    /// Simulated daughters of candidate `index`, resolved against `sim`.
    #[must_use]
    pub fn sim_legs(
        &self,
        index: usize,
        sim: &SimParticles,
    ) -> Option<(Option<usize>, Option<usize>)> {
        (index < self.len()).then(|| {
            (
                resolve_handle(self.sim1_id[index], sim.len()),
                resolve_handle(self.sim2_id[index], sim.len()),
            )
        })
    }

    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) {
        let c = Self::COLLECTION;
        scalar_i64(v, "NKShort", &mut self.count);
        array_f64(v, "KShortPx", c, &mut self.px);
        array_f64(v, "KShortPy", c, &mut self.py);
        array_f64(v, "KShortPz", c, &mut self.pz);
        array_f64(v, "KShortE", c, &mut self.e);
        array_i64(v, "KShortSim1ID", c, &mut self.sim1_id);
        array_i64(v, "KShortSim2ID", c, &mut self.sim2_id);
        array_i64(v, "KShortReco1ID", c, &mut self.reco1_id);
        array_i64(v, "KShortReco2ID", c, &mut self.reco2_id);
        array_f64(v, "KShortReco1Angle", c, &mut self.reco1_angle);
        array_f64(v, "KShortReco2Angle", c, &mut self.reco2_angle);
        array_f64(v, "KShortRecoPx", c, &mut self.reco_px);
        array_f64(v, "KShortRecoPy", c, &mut self.reco_py);
        array_f64(v, "KShortRecoPz", c, &mut self.reco_pz);
        array_f64(v, "KShortRecoE", c, &mut self.reco_e);
    }
}

/// Phi -> K+ K- candidates.
///
/// `gen1_id`/`gen2_id` point into [`GenParticles`], `reco1_id`/`reco2_id`
/// into [`RecoParticles`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhiCandidates {
    /// Count as stored; may exceed capacity.
    pub count: i64,
    pub px: Box<[f64]>,
    pub py: Box<[f64]>,
    pub pz: Box<[f64]>,
    pub e: Box<[f64]>,
    pub gen1_id: Box<[i64]>,
    pub gen2_id: Box<[i64]>,
    pub reco1_id: Box<[i64]>,
    pub reco2_id: Box<[i64]>,
    pub reco1_angle: Box<[f64]>,
    pub reco2_angle: Box<[f64]>,
    pub reco_px: Box<[f64]>,
    pub reco_py: Box<[f64]>,
    pub reco_pz: Box<[f64]>,
    pub reco_e: Box<[f64]>,
}

impl PhiCandidates {
    const COLLECTION: Collection = Collection::Phi;

    fn new() -> Self {
        let n = Self::COLLECTION.capacity();
        Self {
            count: 0,
            px: zeros_f64(n),
            py: zeros_f64(n),
            pz: zeros_f64(n),
            e: zeros_f64(n),
            gen1_id: zeros_i64(n),
            gen2_id: zeros_i64(n),
            reco1_id: zeros_i64(n),
            reco2_id: zeros_i64(n),
            reco1_angle: zeros_f64(n),
            reco2_angle: zeros_f64(n),
            reco_px: zeros_f64(n),
            reco_py: zeros_f64(n),
            reco_pz: zeros_f64(n),
            reco_e: zeros_f64(n),
        }
    }

    /// Valid prefix length (count clipped to capacity).
    #[must_use]
    pub fn len(&self) -> usize {
        Self::COLLECTION.clip(self.count)
    }

    /// Returns true if no candidate is valid.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reconstructed daughters of candidate `index`, resolved against `reco`.
    #[must_use]
    pub fn reco_legs(
        &self,
        index: usize,
        reco: &RecoParticles,
    ) -> Option<(Option<usize>, Option<usize>)> {
        (index < self.len()).then(|| {
            (
                resolve_handle(self.reco1_id[index], reco.len()),
                resolve_handle(self.reco2_id[index], reco.len()),
            )
        })
    }

    /// Generator-level daughters of candidate `index`, resolved against `gen`.
    #[must_use]
    pub fn gen_legs(
        &self,
        index: usize,
        gen: &GenParticles,
    ) -> Option<(Option<usize>, Option<usize>)> {
        (index < self.len()).then(|| {
            (
                resolve_handle(self.gen1_id[index], gen.len()),
                resolve_handle(self.gen2_id[index], gen.len()),
            )
        })
    }

    fn visit_columns(&mut self, v: &mut dyn ColumnVisitor) {
        let c = Self::COLLECTION;
        scalar_i64(v, "NPhi", &mut self.count);
        array_f64(v, "PhiPx", c, &mut self.px);
        array_f64(v, "PhiPy", c, &mut self.py);
        array_f64(v, "PhiPz", c, &mut self.pz);
        array_f64(v, "PhiE", c, &mut self.e);
        array_i64(v, "PhiGen1ID", c, &mut self.gen1_id);
        array_i64(v, "PhiGen2ID", c, &mut self.gen2_id);
        array_i64(v, "PhiReco1ID", c, &mut self.reco1_id);
        array_i64(v, "PhiReco2ID", c, &mut self.reco2_id);
        array_f64(v, "PhiReco1Angle", c, &mut self.reco1_angle);
        array_f64(v, "PhiReco2Angle", c, &mut self.reco2_angle);
        array_f64(v, "PhiRecoPx", c, &mut self.reco_px);
        array_f64(v, "PhiRecoPy", c, &mut self.reco_py);
        array_f64(v, "PhiRecoPz", c, &mut self.reco_pz);
        array_f64(v, "PhiRecoE", c, &mut self.reco_e);
    }
}

/// One collision event: scalars plus the five particle collections.
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    pub scalars: EventScalars,
    pub gen: GenParticles,
    pub reco: RecoParticles,
    pub sim: SimParticles,
    pub kshort: KShortCandidates,
    pub phi: PhiCandidates,
}

impl Default for EventRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRecord {
    /// Allocates a zeroed record with every array at full capacity.
    #[must_use]
    pub fn new() -> Self {
        Self {
            scalars: EventScalars::default(),
            gen: GenParticles::new(),
            reco: RecoParticles::new(),
            sim: SimParticles::new(),
            kshort: KShortCandidates::new(),
            phi: PhiCandidates::new(),
        }
    }

    /// Hands every declared column to `visitor`, in schema order.
    ///
    /// Within a collection the count column is visited before its arrays.
    pub fn visit_columns(&mut self, visitor: &mut dyn ColumnVisitor) {
        self.scalars.visit_columns(visitor);
        self.gen.visit_columns(visitor);
        self.reco.visit_columns(visitor);
        self.sim.visit_columns(visitor);
        self.kshort.visit_columns(visitor);
        self.phi.visit_columns(visitor);
    }

    /// The declared column schema, in visiting order.
    #[must_use]
    pub fn schema() -> &'static [ColumnSpec] {
        static SCHEMA: OnceLock<Vec<ColumnSpec>> = OnceLock::new();
        SCHEMA.get_or_init(|| {
            struct Collect(Vec<ColumnSpec>);
            impl ColumnVisitor for Collect {
                fn visit(&mut self, spec: ColumnSpec, _slot: Slot<'_>) {
                    self.0.push(spec);
                }
            }
            let mut collect = Collect(Vec::new());
            EventRecord::new().visit_columns(&mut collect);
            collect.0
        })
    }

    /// Count as stored for `collection`.
    #[must_use]
    pub fn count(&self, collection: Collection) -> i64 {
        match collection {
            Collection::Gen => self.gen.count,
            Collection::Reco => self.reco.count,
            Collection::Sim => self.sim.count,
            Collection::KShort => self.kshort.count,
            Collection::Phi => self.phi.count,
        }
    }
}
