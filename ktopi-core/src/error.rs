//! Error types for ktopi-core.

use thiserror::Error;

/// Result type alias for ktopi-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Histogram booked with an unusable axis.
    #[error("invalid binning: {n_bins} bins over [{x_min}, {x_max})")]
    InvalidBinning { n_bins: usize, x_min: f64, x_max: f64 },

    /// Two histograms with different axes were combined.
    #[error("histogram '{left}' and '{right}' have incompatible binning")]
    IncompatibleHistograms { left: String, right: String },

    /// Bin index past the last bin.
    #[error("bin {bin} out of range for histogram with {n_bins} bins")]
    BinOutOfRange { bin: usize, n_bins: usize },
}
