//! Error types for time-series storage.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur while writing or reading cell stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Chunk whose arrays disagree with each other or with the existing store.
    #[error("invalid chunk for cell {cell}: {reason}")]
    InvalidChunk { cell: u32, reason: String },

    /// Append would not extend the time axis strictly forward.
    #[error("cell {cell}: time {new} is not after the last stored time {last}")]
    NonMonotonicTime {
        cell: u32,
        last: DateTime<Utc>,
        new: DateTime<Utc>,
    },

    /// Output root already belongs to a different grid.
    #[error("grid mismatch: {0}")]
    GridMismatch(String),

    /// No time series stored for the requested location.
    #[error("no time series for {0}")]
    NotFound(String),

    /// Invalid attributes or layout in an existing store.
    #[error("invalid store metadata: {0}")]
    InvalidMetadata(String),

    /// Zarr format or storage error.
    #[error("Zarr error: {0}")]
    Zarr(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Create an InvalidChunk error.
    pub fn invalid_chunk(cell: u32, reason: impl Into<String>) -> Self {
        Self::InvalidChunk {
            cell,
            reason: reason.into(),
        }
    }

    /// Create a Zarr error.
    pub fn zarr(err: impl std::fmt::Display) -> Self {
        Self::Zarr(err.to_string())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
