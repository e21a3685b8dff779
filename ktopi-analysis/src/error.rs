//! Error types for ktopi-analysis.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for analysis operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Analysis error types.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration entry without `=`.
    #[error("malformed configuration entry '{0}' (expected Key=Value)")]
    MalformedPair(String),

    /// Configuration value that does not parse for its key.
    #[error("invalid value '{value}' for {key}: expected {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: &'static str,
    },

    /// Configuration that parses but cannot be run.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Input store could not be opened.
    #[error("cannot open input {}: {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: ktopi_io::Error,
    },

    /// Output sink could not be created.
    #[error("cannot create output {}: {source}", .path.display())]
    OpenOutput {
        path: PathBuf,
        #[source]
        source: ktopi_io::Error,
    },

    /// Event record could not be bound to the input table.
    #[error("cannot bind table '{table}': {source}")]
    Bind {
        table: String,
        #[source]
        source: ktopi_io::Error,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Store or sink error.
    #[error("store error: {0}")]
    Store(#[from] ktopi_io::Error),

    /// Core library error.
    #[error("core error: {0}")]
    CoreError(#[from] ktopi_core::Error),
}
