//! Error taxonomy shared by every crate in the workspace.
//!
//! Shape and configuration problems abort the call. Numerical edge cases
//! (missing data, degenerate series) never surface here: they come back as
//! NaN entries in the output arrays.

use thiserror::Error;

/// Errors raised by ISC computation and significance testing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum IscError {
    /// Input arrays have mismatched or insufficient dimensions.
    #[error("shape error: {0}")]
    Shape(String),

    /// An unrecognized name or an incompatible argument (statistic, test kind,
    /// comparison side, axis).
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A configuration that cannot produce a valid run (trial count, threshold
    /// out of range, null too small for the requested estimator).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, IscError>;
