//! Error types shared by the MERRA-2 crates.

use thiserror::Error;

/// Result type alias using MerraError.
pub type MerraResult<T> = Result<T, MerraError>;

/// Errors raised by grid, cadence, image and archive handling.
#[derive(Debug, Error)]
pub enum MerraError {
    /// Grid resolution or cell size that cannot produce a usable grid.
    #[error("Invalid grid configuration: {0}")]
    InvalidGrid(String),

    /// Unknown or unsupported temporal cadence.
    #[error("Invalid temporal cadence: {0}")]
    InvalidCadence(String),

    #[error("Unknown product: {0}")]
    UnknownProduct(String),

    /// Image whose arrays are inconsistent with each other.
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Date string that matches none of the accepted formats.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// Local mirror already holds a different product version.
    #[error("Found products of version {found} in {root}, expected {expected}")]
    VersionMismatch {
        root: String,
        found: String,
        expected: String,
    },
}

impl MerraError {
    /// Create an InvalidGrid error.
    pub fn invalid_grid(msg: impl Into<String>) -> Self {
        Self::InvalidGrid(msg.into())
    }

    /// Create an InvalidImage error.
    pub fn invalid_image(msg: impl Into<String>) -> Self {
        Self::InvalidImage(msg.into())
    }
}
