//! The reshuffling state machine.
//!
//! ```text
//! Idle -> Initialized -> Streaming <-> Flushing -> Draining -> Done
//! ```
//!
//! Initialization prepares the output root, reads the first image and keeps
//! its variable metadata as the [`RunMetadata`] handed to every new cell
//! store. Streaming reads one image per timestamp into the buffer and
//! flushes whenever it fills up; draining flushes whatever is left.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use merra_common::{
    inclusive_end, Cadence, GridDefinition, Image, ImageSequence, ImageSource, Product,
};
use serde::Serialize;
use timeseries_store::{RunMetadata, TimeSeriesStore};
use tracing::{debug, info, warn};

use crate::buffer::{regroup, ImageBuffer};
use crate::config::ReshuffleConfig;
use crate::error::{CellFailure, ReshuffleError, Result};

/// Lifecycle of a [`Reshuffler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReshuffleState {
    Idle,
    Initialized,
    Streaming,
    Flushing,
    Draining,
    Done,
}

/// Date range and cadence of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ReshuffleJob {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub cadence: Cadence,
    /// Recorded as `product_name` in every new cell store
    pub product_name: String,
}

impl ReshuffleJob {
    pub fn new(
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cadence: Cadence,
        product_name: impl Into<String>,
    ) -> Self {
        Self {
            start,
            end,
            cadence,
            product_name: product_name.into(),
        }
    }

    /// Job over `product`, at its native cadence unless one is given.
    ///
    /// Fails with [`ReshuffleError::InvalidJob`] when the product's files do
    /// not hold images at `cadence`.
    pub fn for_product(
        product: Product,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cadence: Option<Cadence>,
    ) -> Result<Self> {
        let cadence = cadence.unwrap_or_else(|| product.default_cadence());
        if !product.supports(cadence) {
            return Err(ReshuffleError::InvalidJob(format!(
                "{} files have no {} images",
                product, cadence
            )));
        }
        Ok(Self::new(start, end, cadence, product.product_name()))
    }

    /// Timestamps of the run in order. A `start` with a time of day skips
    /// the earlier images of that day.
    pub fn sequence(&self) -> ImageSequence {
        ImageSequence::new(self.start, self.end, self.cadence)
    }

    fn validate(&self) -> Result<()> {
        if self.start > inclusive_end(self.end) {
            return Err(ReshuffleError::InvalidJob(format!(
                "start {} is after end {}",
                self.start, self.end
            )));
        }
        if self.product_name.is_empty() {
            return Err(ReshuffleError::InvalidJob("empty product name".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReshuffleSummary {
    /// Images read
    pub images: usize,
    /// Images with at least one NaN-filled variable
    pub corrupt_images: usize,
    /// Buffer flushes
    pub flushes: usize,
    /// Cell appends across all flushes
    pub appends: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Moves images from an [`ImageSource`] into a [`TimeSeriesStore`], cell by cell.
pub struct Reshuffler<S, T> {
    source: S,
    store: T,
    grid: Arc<GridDefinition>,
    partition: BTreeMap<u32, Vec<usize>>,
    buffer: ImageBuffer,
    state: ReshuffleState,
    variables: Vec<String>,
    metadata: Option<RunMetadata>,
    summary: ReshuffleSummary,
}

impl<S, T> Reshuffler<S, T>
where
    S: ImageSource,
    T: TimeSeriesStore,
{
    /// Create a reshuffler writing on `grid`.
    ///
    /// `grid` decides the cell partition; the cell sizes in `config` are only
    /// used by callers that build the grid from it.
    pub fn new(
        source: S,
        store: T,
        grid: Arc<GridDefinition>,
        config: &ReshuffleConfig,
    ) -> Result<Self> {
        config.validate().map_err(ReshuffleError::Config)?;
        let partition = grid.cell_partition();

        Ok(Self {
            source,
            store,
            grid,
            partition,
            buffer: ImageBuffer::new(config.image_buffer),
            state: ReshuffleState::Idle,
            variables: Vec::new(),
            metadata: None,
            summary: ReshuffleSummary::default(),
        })
    }

    pub fn state(&self) -> ReshuffleState {
        self.state
    }

    /// Metadata captured from the first image, once initialized.
    pub fn metadata(&self) -> Option<&RunMetadata> {
        self.metadata.as_ref()
    }

    pub fn store(&self) -> &T {
        &self.store
    }

    /// Run `job` to completion.
    ///
    /// Any image read error aborts the run. A flush with failed cells still
    /// writes every other cell, then aborts with
    /// [`ReshuffleError::PartialFlush`].
    pub fn run(&mut self, job: &ReshuffleJob) -> Result<ReshuffleSummary> {
        let (first, sequence) = self.initialize(job)?;

        self.state = ReshuffleState::Streaming;
        self.push(first)?;
        for timestamp in sequence {
            let image = self.read(timestamp)?;
            self.push(image)?;
        }

        self.state = ReshuffleState::Draining;
        if !self.buffer.is_empty() {
            self.flush()?;
        }

        self.state = ReshuffleState::Done;
        info!(
            images = self.summary.images,
            flushes = self.summary.flushes,
            appends = self.summary.appends,
            corrupt_images = self.summary.corrupt_images,
            "Reshuffling complete"
        );
        Ok(self.summary.clone())
    }

    fn initialize(&mut self, job: &ReshuffleJob) -> Result<(Image, ImageSequence)> {
        if self.state != ReshuffleState::Idle {
            return Err(ReshuffleError::InvalidState {
                state: self.state,
                action: "start a run",
            });
        }
        job.validate()?;

        let mut sequence = job.sequence();
        let first_timestamp = sequence.next().ok_or_else(|| {
            ReshuffleError::InvalidJob(format!(
                "no {} timestamps between {} and {}",
                job.cadence, job.start, job.end
            ))
        })?;

        self.store.prepare(self.grid.spec())?;

        let first = self.read(first_timestamp)?;
        self.variables = first.variables().map(str::to_string).collect();
        self.metadata = Some(RunMetadata {
            product_name: job.product_name.clone(),
            variables: first.metadata().clone(),
        });
        self.state = ReshuffleState::Initialized;

        info!(
            start = %job.start,
            end = %job.end,
            cadence = %job.cadence,
            product = %job.product_name,
            variables = ?self.variables,
            cells = self.partition.len(),
            buffer = self.buffer.capacity(),
            "Reshuffling initialized"
        );
        Ok((first, sequence))
    }

    fn read(&mut self, timestamp: DateTime<Utc>) -> Result<Image> {
        let image = self
            .source
            .read(timestamp)
            .map_err(|e| ReshuffleError::ImageRead {
                timestamp,
                source: Box::new(e),
            })?;

        if image.len() != self.grid.len() {
            return Err(ReshuffleError::ImageMismatch {
                timestamp,
                reason: format!("{} values for {} grid points", image.len(), self.grid.len()),
            });
        }
        if self.metadata.is_some()
            && !image
                .variables()
                .eq(self.variables.iter().map(String::as_str))
        {
            return Err(ReshuffleError::ImageMismatch {
                timestamp,
                reason: format!(
                    "variables {:?}, expected {:?}",
                    image.variables().collect::<Vec<_>>(),
                    self.variables
                ),
            });
        }

        if !image.corrupt_variables().is_empty() {
            self.summary.corrupt_images += 1;
        }
        self.summary.images += 1;
        self.summary.first.get_or_insert(timestamp);
        self.summary.last = Some(timestamp);
        debug!(timestamp = %timestamp, "Image read");
        Ok(image)
    }

    fn push(&mut self, image: Image) -> Result<()> {
        if self.buffer.push(image) {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let resume = self.state;
        self.state = ReshuffleState::Flushing;

        let metadata = self.metadata.as_ref().ok_or(ReshuffleError::InvalidState {
            state: resume,
            action: "flush before initialization",
        })?;

        let images = self.buffer.take();
        let chunks = regroup(&images, &self.grid, &self.partition, &self.variables);

        let mut failed = Vec::new();
        for chunk in &chunks {
            if let Err(e) = self.store.append(chunk, metadata) {
                warn!(cell = chunk.cell, error = %e, "Cell append failed");
                failed.push(CellFailure {
                    cell: chunk.cell,
                    reason: e.to_string(),
                });
            }
        }

        self.summary.flushes += 1;
        self.summary.appends += chunks.len() - failed.len();
        info!(
            images = images.len(),
            cells = chunks.len(),
            failed = failed.len(),
            first = ?images.first().map(Image::timestamp),
            last = ?images.last().map(Image::timestamp),
            "Flushed image buffer"
        );

        if !failed.is_empty() {
            return Err(ReshuffleError::PartialFlush { failed });
        }
        self.state = resume;
        Ok(())
    }
}
