//! ktopi-analysis: K/π yield analysis versus tagged charged multiplicity.
//!
//! This crate provides the run configuration, the event selection, the
//! yield aggregation with PID unmixing and the run driver that ties the
//! bound input to the histogram output.
//!

mod config;
mod engine;
mod error;
mod pipeline;
pub mod selection;

pub use config::{parse_bool, AnalysisConfig, MAX_NCH_TAG_BINS};
pub use engine::{
    AnalysisResult, Analyzer, CorrectedYields, CutFlow, Diagnostic, Level, MAX_EVENT_DIAGNOSTICS,
};
pub use error::{Error, Result};
pub use pipeline::{run, Pipeline, RunReport, Stage};
pub use selection::{EventSelection, Rejection};
