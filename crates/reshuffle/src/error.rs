//! Error types for reshuffling runs.

use chrono::{DateTime, Utc};
use thiserror::Error;
use timeseries_store::StoreError;

use crate::reshuffler::ReshuffleState;

/// A cell whose append failed during a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct CellFailure {
    pub cell: u32,
    pub reason: String,
}

/// Errors that can occur during a reshuffling run.
#[derive(Error, Debug)]
pub enum ReshuffleError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid job: {0}")]
    InvalidJob(String),

    /// Whole-image read failure; aborts the run.
    #[error("Failed to read image for {timestamp}: {source}")]
    ImageRead {
        timestamp: DateTime<Utc>,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Image that does not fit the run's grid or variables.
    #[error("Image for {timestamp} does not match the run: {reason}")]
    ImageMismatch {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    /// Some cells of a flush could not be written; the others were.
    #[error("Flush failed for {} cell(s): {}", failed.len(), describe(failed))]
    PartialFlush { failed: Vec<CellFailure> },

    #[error("Cannot {action} in state {state:?}")]
    InvalidState {
        state: ReshuffleState,
        action: &'static str,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ReshuffleError {
    /// Cells that failed, if this is a [`ReshuffleError::PartialFlush`].
    pub fn failed_cells(&self) -> Vec<u32> {
        match self {
            Self::PartialFlush { failed } => failed.iter().map(|f| f.cell).collect(),
            _ => Vec::new(),
        }
    }
}

fn describe(failed: &[CellFailure]) -> String {
    failed
        .iter()
        .map(|f| format!("{} ({})", f.cell, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for reshuffling operations.
pub type Result<T> = std::result::Result<T, ReshuffleError>;
