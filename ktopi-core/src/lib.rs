//! ktopi-core: Core types for the kaon-to-pion yield analysis.
//!
//! This crate provides the fixed-capacity event record and its column
//! schema, the weighted 1-D histogram used for yields, and the 2×2
//! particle-identification response matrix used to unmix tagged yields.
//!

pub mod error;
pub mod histogram;
pub mod pid;
pub mod record;
pub mod schema;

pub use error::{Error, Result};
pub use histogram::Histogram1D;
pub use pid::{CalibrationAccumulator, ResponseMatrix, Species, SINGULAR_DETERMINANT};
pub use record::{
    EventRecord, EventScalars, GenParticles, KShortCandidates, PhiCandidates, RecoParticles,
    SimParticles, UNMATCHED,
};
pub use schema::{Collection, ColumnSpec, ColumnVisitor, Shape, Slot, ValueKind};
