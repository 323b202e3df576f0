//! Error types for NetCDF image reading.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use merra_common::MerraError;
use thiserror::Error;

/// Result type for NetCDF parser operations.
pub type NetCdfResult<T> = Result<T, NetCdfError>;

/// Whole-file failures. Problems with single variables never surface here;
/// they are NaN-filled and listed on the returned image.
#[derive(Error, Debug)]
pub enum NetCdfError {
    /// No archive file for the requested timestamp
    #[error("No file for {timestamp} matching {pattern} in {}", dir.display())]
    FileNotFound {
        timestamp: DateTime<Utc>,
        dir: PathBuf,
        pattern: String,
    },

    /// File exists but could not be opened as NetCDF
    #[error("Failed to open {}: {message}", path.display())]
    FileOpen { path: PathBuf, message: String },

    /// Variables read from the file do not form a consistent image
    #[error("Invalid image from {}: {source}", path.display())]
    InvalidImage {
        path: PathBuf,
        #[source]
        source: MerraError,
    },
}
