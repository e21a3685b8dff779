//! I/O error types.

use ktopi_core::ValueKind;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Table absent from the store.
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Declared column absent from the table.
    #[error("column '{column}' not found in table '{table}'")]
    ColumnNotFound { table: String, column: String },

    /// Declared columns absent from the table at bind time.
    #[error("table '{table}' is missing {} declared column(s): {}", .missing.len(), .missing.join(", "))]
    MissingColumns {
        table: String,
        missing: Vec<&'static str>,
    },

    /// Stored element type differs from the declared one.
    #[error("column '{column}' holds {found}, expected {expected}")]
    ColumnKind {
        column: String,
        expected: ValueKind,
        found: String,
    },

    /// Entry index outside `[0, entries)`.
    #[error("entry {entry} out of range (entries: {entries})")]
    EntryOutOfRange { entry: u64, entries: u64 },

    /// Column decoded fewer values than the entry requires.
    #[error("short read of '{column}' at entry {entry}: decoded {decoded}, expected {expected}")]
    ShortRead {
        column: &'static str,
        entry: u64,
        expected: usize,
        decoded: usize,
    },

    /// Reader has no table attached.
    #[error("reader is not bound to a table")]
    NotBound,

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] ktopi_core::Error),
}
