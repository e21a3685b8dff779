//! ktopi-io: Column-store input and histogram output for ktopi.
//!
//! This crate binds the fixed-capacity event record to a table of a column
//! store (in-memory/JSON, or HDF5 with the `hdf5` feature) and writes the
//! output histograms.
//!

mod binding;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod memory;
mod sink;
pub mod store;

pub use binding::EventReader;
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_histograms_hdf5, write_table_hdf5, Hdf5HistogramSink, Hdf5Store};
pub use memory::{MemoryColumn, MemoryStore, MemoryTable};
pub use sink::{
    create_sink, read_histograms, read_histograms_json, CsvHistogramSink, HistogramSink,
    JsonHistogramSink,
};
pub use store::{missing_columns, open_store, ColumnReader, ColumnStore, TableSource};
